//! Writes a small one-page PDF used when no document is available yet.

use crate::error::IngestError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;

pub const SAMPLE_LINES: [&str; 4] = [
    "This is a sample document about OpenAI and LangChain.",
    "OpenAI provides powerful language models like GPT-4o.",
    "LangChain allows easy integration and building complex LLM applications.",
    "Agents in LangChain can use tools to perform various tasks.",
];

pub fn write_sample_pdf(path: &Path) -> Result<(), IngestError> {
    write_text_pdf(path, &SAMPLE_LINES)
}

/// Writes `lines` top to bottom on a single A4 page in 12pt Courier.
pub fn write_text_pdf(path: &Path, lines: &[&str]) -> Result<(), IngestError> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let y = 750 - (index as i64) * 20;
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new("Td", vec![100.into(), y.into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }

    let content = Content { operations }
        .encode()
        .map_err(|error| IngestError::PdfWrite(error.to_string()))?;
    let content_id = document.add_object(Stream::new(dictionary! {}, content));

    let page_id = document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });

    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    document
        .save(path)
        .map_err(|error| IngestError::PdfWrite(error.to_string()))?;
    Ok(())
}
