use crate::{ChatResponse, Message, ProviderError, ToolDefinition};

/// A chat-completion backend that may answer with tool calls.
pub trait ChatModel {
    fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, ProviderError>;
}

/// A named capability the agent can call with a free-text query.
pub trait Tool {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Never fails; pipeline errors are reported inside the returned text.
    fn invoke(&self, query: &str) -> String;
}
