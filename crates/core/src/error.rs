use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("pdf not found: {0}")]
    MissingFile(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("pdf write error: {0}")]
    PdfWrite(String),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("missing credential: {0} is not set in the environment")]
    MissingCredential(String),

    #[error("invalid provider config: {0}")]
    InvalidConfig(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Error for a non-success HTTP status, keeping the response body for context.
    pub fn status(backend: &str, status: reqwest::StatusCode, body: &str) -> Self {
        ProviderError::BackendResponse {
            backend: backend.to_string(),
            details: format!("{status}: {}", body.trim()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no documents provided and no existing vector store at {0}")]
    NoSource(String),

    #[error("vector store not initialized; call create_or_load first")]
    NotInitialized,

    #[error("refusing to build a vector store from an empty chunk set")]
    EmptyChunkSet,

    #[error("retriever top-k must be at least 1")]
    InvalidTopK,

    #[error("vector store built with embedding model {found}, but {expected} is configured")]
    EmbedderMismatch { expected: String, found: String },

    #[error("query embedding has {found} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("vector store at {path} is corrupt: {details}")]
    Corrupt { path: String, details: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(#[from] ProviderError),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] StoreError),

    #[error("no relevant context was retrieved for the query")]
    EmptyRetrieval,

    #[error("chat completion failed: {0}")]
    Chat(#[from] ProviderError),

    #[error("chat model returned an empty answer")]
    EmptyAnswer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_error_names_backend_code_and_body() {
        let error = ProviderError::status("chat", StatusCode::TOO_MANY_REQUESTS, "slow down\n");
        assert_eq!(
            error.to_string(),
            "invalid response from chat: 429 Too Many Requests: slow down"
        );
    }
}
