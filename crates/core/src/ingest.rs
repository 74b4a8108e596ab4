use crate::chunking::{build_chunks, ChunkingConfig};
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::{IngestError, LoaderOptions, PdfChunk};
use std::path::Path;
use tracing::{error, info};

/// Loads a PDF and splits it into chunks. Any failure is logged and yields an
/// empty vector; callers decide whether that is fatal.
pub fn load_and_split(path: &Path, options: &LoaderOptions) -> Vec<PdfChunk> {
    match try_load_and_split(path, options) {
        Ok(chunks) => chunks,
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to load or split pdf");
            Vec::new()
        }
    }
}

pub fn try_load_and_split(
    path: &Path,
    options: &LoaderOptions,
) -> Result<Vec<PdfChunk>, IngestError> {
    load_with(&LopdfExtractor, path, options)
}

pub fn load_with<X: PdfExtractor>(
    extractor: &X,
    path: &Path,
    options: &LoaderOptions,
) -> Result<Vec<PdfChunk>, IngestError> {
    let config = ChunkingConfig::from(options);
    config.validate()?;

    let pages = extractor.extract_pages(path)?;
    info!(path = %path.display(), pages = pages.len(), "loaded pdf pages");

    let source_path = path.to_string_lossy().to_string();
    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for page in pages {
        let (page_chunks, next_cursor) =
            build_chunks(&source_path, page.number, &page.text, config, cursor);
        cursor = next_cursor;
        chunks.extend(page_chunks);
    }

    info!(path = %path.display(), chunks = chunks.len(), "split pdf into chunks");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::PageText;
    use crate::sample::write_sample_pdf;
    use std::fs;
    use tempfile::tempdir;

    struct FixedPages(Vec<PageText>);

    impl PdfExtractor for FixedPages {
        fn extract_pages(&self, _path: &Path) -> Result<Vec<PageText>, IngestError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn missing_path_yields_no_chunks() {
        let chunks = load_and_split(Path::new("/no/such/file.pdf"), &LoaderOptions::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn unreadable_pdf_yields_no_chunks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"not a pdf at all")?;

        assert!(load_and_split(&path, &LoaderOptions::default()).is_empty());
        Ok(())
    }

    #[test]
    fn sample_pdf_produces_chunks() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("sample.pdf");
        write_sample_pdf(&path)?;

        let chunks = load_and_split(&path, &LoaderOptions::default());
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|chunk| chunk.page == 1));
        assert!(chunks.iter().any(|chunk| chunk.text.contains("OpenAI")));
        Ok(())
    }

    #[test]
    fn chunk_indices_continue_across_pages() -> Result<(), Box<dyn std::error::Error>> {
        let extractor = FixedPages(vec![
            PageText {
                number: 1,
                text: "alpha beta gamma delta epsilon zeta".to_string(),
            },
            PageText {
                number: 3,
                text: "eta theta iota".to_string(),
            },
        ]);
        let options = LoaderOptions {
            chunk_size: 20,
            chunk_overlap: 5,
        };

        let chunks = load_with(&extractor, Path::new("doc.pdf"), &options)?;
        let indices: Vec<u64> = chunks.iter().map(|chunk| chunk.chunk_index).collect();
        let expected: Vec<u64> = (0..chunks.len() as u64).collect();
        assert_eq!(indices, expected);
        assert_eq!(chunks.last().map(|chunk| chunk.page), Some(3));
        Ok(())
    }

    #[test]
    fn invalid_options_are_rejected_before_reading() {
        let options = LoaderOptions {
            chunk_size: 100,
            chunk_overlap: 200,
        };
        let result = try_load_and_split(Path::new("/no/such/file.pdf"), &options);
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }
}
