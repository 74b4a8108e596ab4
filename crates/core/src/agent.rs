use crate::tools::AgentTools;
use crate::traits::ChatModel;
use crate::{Message, ProviderError, ToolCall};
use serde::Deserialize;
use std::io::{BufRead, Write};
use std::rc::Rc;
use tracing::{info, warn};

pub const MAX_TOOL_ROUNDS: usize = 3;
pub const EXIT_COMMAND: &str = "exit";
pub const FAREWELL: &str = "Thank you for using the PDF Explainer. Goodbye!";

const AGENT_SYSTEM_PROMPT: &str = "You are a helpful assistant that explains the contents of a PDF document. \
For questions about the document, call explain_pdf_content. \
For questions unrelated to the document, call general_knowledge_search. \
Answer directly only for greetings or small talk. \
Base your final answer on the tool results.";

#[derive(Debug, Deserialize)]
struct QueryArguments {
    query: String,
}

/// Routes each user query through the chat model's tool-calling decision.
pub struct PdfExplainerAgent<M> {
    chat_model: Rc<M>,
    tools: AgentTools<M>,
}

impl<M: ChatModel> PdfExplainerAgent<M> {
    pub fn new(chat_model: Rc<M>, tools: AgentTools<M>) -> Self {
        Self { chat_model, tools }
    }

    /// Resolves one query in a fresh conversation.
    pub fn query(&self, query: &str) -> Result<String, ProviderError> {
        let definitions = self.tools.definitions();
        let mut conversation = vec![Message::system(AGENT_SYSTEM_PROMPT), Message::user(query)];
        let mut last_tool_output = None;

        for round in 0..MAX_TOOL_ROUNDS {
            let response = self.chat_model.complete(&conversation, &definitions)?;

            if response.tool_calls.is_empty() {
                return Ok(response
                    .content
                    .or(last_tool_output)
                    .unwrap_or_else(|| "I could not produce an answer.".to_string()));
            }

            info!(round = round + 1, calls = response.tool_calls.len(), "tool round");
            let calls = response.tool_calls.clone();
            conversation.push(Message::assistant(response.content, response.tool_calls));

            for call in &calls {
                let output = self.run_tool_call(call, query);
                conversation.push(Message::tool(output.clone(), call.id.clone()));
                last_tool_output = Some(output);
            }
        }

        warn!(rounds = MAX_TOOL_ROUNDS, "tool round limit reached; asking for a final answer");
        let response = self.chat_model.complete(&conversation, &[])?;
        Ok(response
            .content
            .or(last_tool_output)
            .unwrap_or_else(|| "I could not produce an answer.".to_string()))
    }

    fn run_tool_call(&self, call: &ToolCall, original_query: &str) -> String {
        let tool_query = match serde_json::from_str::<QueryArguments>(&call.function.arguments) {
            Ok(arguments) if !arguments.query.trim().is_empty() => arguments.query,
            _ => {
                warn!(
                    tool = %call.function.name,
                    arguments = %call.function.arguments,
                    "unusable tool arguments; using the original query"
                );
                original_query.to_string()
            }
        };
        self.tools.dispatch(&call.function.name, &tool_query)
    }
}

pub fn is_exit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(EXIT_COMMAND)
}

/// Reads queries line by line until `exit` or end of input. A failed query is
/// reported and the loop keeps going.
pub fn run_repl<M, R, W>(agent: &PdfExplainerAgent<M>, input: R, mut output: W) -> std::io::Result<()>
where
    M: ChatModel,
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(output, "You: ")?;
        output.flush()?;

        let Some(line) = lines.next().transpose()? else {
            writeln!(output)?;
            break;
        };

        if is_exit_command(&line) {
            break;
        }

        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        match agent.query(query) {
            Ok(answer) => writeln!(output, "Agent: {answer}\n")?,
            Err(err) => {
                warn!(error = %err, "query failed");
                writeln!(output, "Agent: Sorry, something went wrong answering that: {err}\n")?;
            }
        }
    }

    writeln!(output, "{FAREWELL}")?;
    output.flush()
}
