use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use pdf_explainer_core::{
    get_chat_model_from_env, get_embeddings_model_from_env, load_and_split, run_repl,
    write_sample_pdf, AgentTools, ChatModelConfig, EmbeddingsConfig, LoaderOptions,
    PdfExplainerAgent, VectorStoreManager,
};
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-explainer", version, about = "Ask questions about a PDF from the terminal")]
struct Cli {
    /// PDF to load; a small sample is written here if it does not exist
    #[arg(long, env = "PDF_EXPLAINER_PDF", default_value = "document.pdf")]
    pdf: PathBuf,

    /// Directory holding the persisted vector store
    #[arg(long, env = "PDF_EXPLAINER_STORE_DIR", default_value = pdf_explainer_core::DEFAULT_PERSIST_DIRECTORY)]
    store_dir: PathBuf,

    /// Chat model identifier
    #[arg(long, env = "PDF_EXPLAINER_CHAT_MODEL", default_value = pdf_explainer_core::providers::DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Sampling temperature for the chat model
    #[arg(long, default_value_t = pdf_explainer_core::providers::DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Base URL of the OpenAI-compatible chat API
    #[arg(long, env = "PDF_EXPLAINER_CHAT_BASE_URL", default_value = pdf_explainer_core::providers::DEFAULT_CHAT_BASE_URL)]
    chat_base_url: String,

    /// Embedding model; char-trigram-<dims> runs locally
    #[arg(long, env = "PDF_EXPLAINER_EMBEDDING_MODEL", default_value = "char-trigram-384")]
    embedding_model: String,

    /// Base URL of an OpenAI-compatible embeddings API (requires EMBEDDINGS_API_KEY)
    #[arg(long, env = "PDF_EXPLAINER_EMBEDDING_ENDPOINT")]
    embedding_endpoint: Option<String>,

    /// Number of chunks retrieved per question
    #[arg(long, default_value_t = pdf_explainer_core::DEFAULT_TOP_K)]
    top_k: usize,

    /// Reuse the persisted store instead of rebuilding it from the PDF
    #[arg(long, default_value_t = false)]
    reuse_store: bool,

    /// Remove the persisted store when the session ends
    #[arg(long, default_value_t = false)]
    delete_store_on_exit: bool,
}

fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-explainer boot"
    );

    let chat_model = get_chat_model_from_env(&ChatModelConfig {
        model: cli.chat_model.clone(),
        temperature: cli.temperature,
        base_url: cli.chat_base_url.clone(),
        max_tokens: None,
    })
    .context("failed to configure chat model")?;

    let embedder = get_embeddings_model_from_env(&EmbeddingsConfig {
        model: cli.embedding_model.clone(),
        endpoint: cli.embedding_endpoint.clone(),
    })
    .context("failed to configure embedding model")?;

    let mut manager = VectorStoreManager::new(embedder, &cli.store_dir);

    if cli.reuse_store && manager.store_exists() {
        manager
            .create_or_load(None)
            .context("failed to load vector store")?;
    } else {
        if cli.reuse_store {
            warn!(path = %cli.store_dir.display(), "no stored index to reuse; rebuilding from pdf");
        }

        if !cli.pdf.exists() {
            warn!(path = %cli.pdf.display(), "pdf not found; writing a sample document");
            write_sample_pdf(&cli.pdf).context("failed to write sample pdf")?;
        } else {
            info!(path = %cli.pdf.display(), "using existing pdf");
        }

        let chunks = load_and_split(&cli.pdf, &LoaderOptions::default());
        if chunks.is_empty() {
            bail!("no chunks loaded from {}", cli.pdf.display());
        }

        manager
            .create_or_load(Some(chunks.as_slice()))
            .context("failed to build vector store")?;
    }

    let retriever = manager
        .get_retriever(cli.top_k)
        .context("failed to create retriever")?;

    let chat_model = Rc::new(chat_model);
    let tools = AgentTools::new(retriever, Rc::clone(&chat_model));
    let agent = PdfExplainerAgent::new(chat_model, tools);

    println!("Type your questions about the PDF or general topics. Type 'exit' to quit.");
    let stdin = io::stdin();
    run_repl(&agent, stdin.lock(), io::stdout().lock()).context("terminal i/o failed")?;

    if cli.delete_store_on_exit {
        manager.delete().context("failed to delete vector store")?;
    }

    Ok(())
}
