use crate::providers::query_tool_definition;
use crate::store::Retriever;
use crate::traits::{ChatModel, Tool};
use crate::{Message, ScoredChunk, ToolDefinition, ToolError};
use std::rc::Rc;
use tracing::{info, warn};

const QA_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Keep the answer concise and to the point.";

/// The closed set of tools the agent may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ExplainPdfContent,
    GeneralKnowledgeSearch,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::ExplainPdfContent, ToolKind::GeneralKnowledgeSearch];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ExplainPdfContent => "explain_pdf_content",
            ToolKind::GeneralKnowledgeSearch => "general_knowledge_search",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name.trim())
    }
}

/// Answers questions about the PDF by retrieving context and asking the chat model.
pub struct ContentExplainTool<M> {
    retriever: Retriever,
    chat_model: Rc<M>,
}

impl<M: ChatModel> ContentExplainTool<M> {
    pub fn new(retriever: Retriever, chat_model: Rc<M>) -> Self {
        Self {
            retriever,
            chat_model,
        }
    }

    pub fn answer(&self, query: &str) -> Result<String, ToolError> {
        let hits = self.retriever.retrieve(query)?;
        if hits.is_empty() {
            return Err(ToolError::EmptyRetrieval);
        }

        let messages = [
            Message::system(format!(
                "{QA_SYSTEM_PROMPT}\n\nContext:\n{}",
                render_context(&hits)
            )),
            Message::user(query),
        ];

        let response = self.chat_model.complete(&messages, &[])?;
        response
            .content
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ToolError::EmptyAnswer)
    }
}

impl<M: ChatModel> Tool for ContentExplainTool<M> {
    fn name(&self) -> &'static str {
        ToolKind::ExplainPdfContent.name()
    }

    fn description(&self) -> &'static str {
        "Use this tool to answer questions about the content of the PDF document. \
Input should be a clear and concise question about the PDF."
    }

    fn invoke(&self, query: &str) -> String {
        info!(tool = self.name(), query, "agent using tool");
        match self.answer(query) {
            Ok(answer) => answer,
            Err(err) => {
                warn!(tool = self.name(), error = %err, "tool pipeline failed");
                format!("An error occurred while explaining the PDF content: {err}")
            }
        }
    }
}

fn render_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| format!("[page {}] {}", hit.chunk.page, hit.chunk.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Placeholder for an external search backend: always reports that the
/// question is outside the document.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneralKnowledgeTool;

impl Tool for GeneralKnowledgeTool {
    fn name(&self) -> &'static str {
        ToolKind::GeneralKnowledgeSearch.name()
    }

    fn description(&self) -> &'static str {
        "Use this tool to answer general knowledge questions not directly from the PDF. \
This tool simulates an external search."
    }

    fn invoke(&self, query: &str) -> String {
        info!(tool = self.name(), query, "agent using tool");
        out_of_scope_answer(query)
    }
}

pub fn out_of_scope_answer(query: &str) -> String {
    format!(
        "Simulated general knowledge search for '{query}': The answer is outside the PDF's scope or requires external research."
    )
}

pub fn unknown_tool_answer(name: &str) -> String {
    let known = ToolKind::ALL.map(ToolKind::name).join(", ");
    format!("Tool '{name}' is not available. Known tools: {known}.")
}

/// Both tools, addressable by [`ToolKind`].
pub struct AgentTools<M> {
    explain: ContentExplainTool<M>,
    general: GeneralKnowledgeTool,
}

impl<M: ChatModel> AgentTools<M> {
    pub fn new(retriever: Retriever, chat_model: Rc<M>) -> Self {
        Self {
            explain: ContentExplainTool::new(retriever, chat_model),
            general: GeneralKnowledgeTool,
        }
    }

    pub fn get(&self, kind: ToolKind) -> &dyn Tool {
        match kind {
            ToolKind::ExplainPdfContent => &self.explain,
            ToolKind::GeneralKnowledgeSearch => &self.general,
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolKind::ALL
            .into_iter()
            .map(|kind| {
                let tool = self.get(kind);
                query_tool_definition(tool.name(), tool.description())
            })
            .collect()
    }

    /// Runs the named tool; unknown names fail closed with a fixed message.
    pub fn dispatch(&self, name: &str, query: &str) -> String {
        match ToolKind::from_name(name) {
            Some(kind) => self.get(kind).invoke(query),
            None => {
                warn!(tool = name, "model requested an unknown tool");
                unknown_tool_answer(name)
            }
        }
    }
}
