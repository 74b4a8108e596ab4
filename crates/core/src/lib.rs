pub mod agent;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod manager;
pub mod models;
pub mod providers;
pub mod sample;
pub mod store;
pub mod tools;
pub mod traits;

pub use agent::{is_exit_command, run_repl, PdfExplainerAgent, FAREWELL};
pub use chunking::{build_chunks, split_text, ChunkingConfig};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{IngestError, ProviderError, StoreError, ToolError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{load_and_split, try_load_and_split};
pub use manager::{VectorStoreManager, DEFAULT_PERSIST_DIRECTORY, DEFAULT_TOP_K};
pub use models::{
    ChatResponse, FunctionCall, LoaderOptions, Message, PdfChunk, Role, ScoredChunk, ToolCall,
    ToolDefinition,
};
pub use providers::{
    get_chat_model, get_chat_model_from_env, get_embeddings_model, get_embeddings_model_from_env,
    ChatModelConfig, EmbeddingsConfig, OpenRouterChat,
};
pub use sample::write_sample_pdf;
pub use store::{Retriever, StoreMode, VectorStore};
pub use tools::{AgentTools, ContentExplainTool, GeneralKnowledgeTool, ToolKind};
pub use traits::{ChatModel, Tool};
