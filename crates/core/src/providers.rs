use crate::embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS, LOCAL_MODEL_PREFIX,
};
use crate::traits::ChatModel;
use crate::{ChatResponse, Message, ProviderError, ToolCall, ToolDefinition};
use regex::Regex;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const CHAT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const EMBEDDINGS_API_KEY_ENV: &str = "EMBEDDINGS_API_KEY";
pub const DEFAULT_CHAT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CHAT_MODEL: &str = "deepseek/deepseek-r1:free";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct ChatModelConfig {
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    pub max_tokens: Option<u32>,
}

impl Default for ChatModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingsConfig {
    pub model: String,
    /// Base URL of an OpenAI-compatible API; `None` selects the local embedder.
    pub endpoint: Option<String>,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: format!("{LOCAL_MODEL_PREFIX}{DEFAULT_EMBEDDING_DIMENSIONS}"),
            endpoint: None,
        }
    }
}

fn credential_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

fn require_credential(api_key: Option<String>, var: &str) -> Result<String, ProviderError> {
    api_key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ProviderError::MissingCredential(var.to_string()))
}

pub fn get_chat_model(
    config: &ChatModelConfig,
    api_key: Option<String>,
) -> Result<OpenRouterChat, ProviderError> {
    let api_key = require_credential(api_key, CHAT_API_KEY_ENV)?;
    OpenRouterChat::new(config.clone(), api_key)
}

pub fn get_chat_model_from_env(config: &ChatModelConfig) -> Result<OpenRouterChat, ProviderError> {
    get_chat_model(config, credential_from_env(CHAT_API_KEY_ENV))
}

pub fn get_embeddings_model(
    config: &EmbeddingsConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn Embedder>, ProviderError> {
    match config.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => {
            let api_key = require_credential(api_key, EMBEDDINGS_API_KEY_ENV)?;
            Ok(Arc::new(HttpEmbedder::new(endpoint, config.model.clone(), api_key)?))
        }
        _ => CharacterNgramEmbedder::from_model_id(&config.model)
            .map(|embedder| Arc::new(embedder) as Arc<dyn Embedder>)
            .ok_or_else(|| {
                ProviderError::InvalidConfig(format!(
                    "unknown local embedding model '{}'; expected {LOCAL_MODEL_PREFIX}<dimensions> or an embeddings endpoint",
                    config.model
                ))
            }),
    }
}

pub fn get_embeddings_model_from_env(
    config: &EmbeddingsConfig,
) -> Result<Arc<dyn Embedder>, ProviderError> {
    get_embeddings_model(config, credential_from_env(EMBEDDINGS_API_KEY_ENV))
}

/// Blocking client for an OpenAI-compatible chat-completions API.
pub struct OpenRouterChat {
    client: Client,
    endpoint: Url,
    api_key: String,
    config: ChatModelConfig,
}

impl OpenRouterChat {
    pub fn new(config: ChatModelConfig, api_key: String) -> Result<Self, ProviderError> {
        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(ProviderError::InvalidConfig(format!(
                "temperature {} outside 0.0..=2.0",
                config.temperature
            )));
        }

        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        let base = Url::parse(&format!("{}/", config.base_url.trim_end_matches('/')))?;
        Ok(Self {
            client,
            endpoint: base.join("chat/completions")?,
            api_key,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<Value, ProviderError> {
        let mut body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": serde_json::to_value(messages)?,
        });

        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if !tools.is_empty() {
            let definitions: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(definitions);
        }

        Ok(body)
    }
}

impl ChatModel for OpenRouterChat {
    fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, ProviderError> {
        let body = self.request_body(messages, tools)?;
        debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.len(),
            "chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::status("chat", status, &text));
        }

        let parsed: CompletionResponse = response.json()?;
        parse_completion(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

fn parse_completion(parsed: CompletionResponse) -> Result<ChatResponse, ProviderError> {
    if let Some(error) = parsed.error {
        return Err(ProviderError::BackendResponse {
            backend: "chat".to_string(),
            details: error.to_string(),
        });
    }

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::BackendResponse {
            backend: "chat".to_string(),
            details: "no choices in response".to_string(),
        })?;

    Ok(ChatResponse {
        content: choice
            .message
            .content
            .map(|content| strip_reasoning(&content))
            .filter(|content| !content.is_empty()),
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
    })
}

fn reasoning_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").ok())
        .as_ref()
}

/// Removes `<think>...</think>` blocks emitted by reasoning models.
pub fn strip_reasoning(content: &str) -> String {
    match reasoning_pattern() {
        Some(pattern) => pattern.replace_all(content, "").trim().to_string(),
        None => content.trim().to_string(),
    }
}

fn query_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The question to answer."
            }
        },
        "required": ["query"]
    })
}

/// Function definition taking a single required `query` string.
pub fn query_tool_definition(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        parameters: query_parameters(),
    }
}
