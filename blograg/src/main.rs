use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blograg::{
    ChatClient, ChunkIndex, Embedder, EmbeddingBackend, FastEmbedder, InlineChunk, LanceChunkIndex,
    MemoryChunkIndex, OrchestratorConfig, QueryOrchestrator, RemoteEmbedder, Settings,
};

#[derive(Parser)]
#[command(name = "blograg")]
#[command(about = "Cached question answering over blog posts", long_about = None)]
struct Cli {
    /// Data directory for the chunk index (overrides BLOGRAG_DATA_DIR)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Chunk index backend
    #[arg(long, value_enum, default_value_t = IndexBackend::Lance)]
    index: IndexBackend,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexBackend {
    /// LanceDB table under the data directory
    Lance,
    /// Process memory (lost on exit)
    Memory,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index a post, replacing its previous chunks
    Index {
        /// Document ID
        document_id: String,

        /// Text file with the post content
        file: PathBuf,
    },

    /// Ask a single question
    Ask {
        /// The question
        question: String,

        /// Document ID (omit to answer from --inline chunks)
        #[arg(short = 'D', long)]
        document: Option<String>,

        /// JSON file with inline chunks: [{"text": .., "embedding": [..]}]
        #[arg(long)]
        inline: Option<PathBuf>,

        /// Index this file under the document before asking
        #[arg(long, requires = "document")]
        index_file: Option<PathBuf>,
    },

    /// Ask questions about a post interactively
    Chat {
        /// Document ID
        document: String,

        /// Index this file under the document before chatting
        #[arg(long)]
        index_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "blograg=info,blograg_cache=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::from_env().context("Failed to load settings")?;
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }

    let orch = create_orchestrator(&cli, &settings).await?;

    match cli.command {
        Commands::Index { ref document_id, ref file } => {
            let count = index_file(&orch, document_id, file).await?;
            println!("Indexed {} chunks for {}", count, document_id);
        }

        Commands::Ask { ref question, ref document, ref inline, index_file: ref to_index } => {
            if let (Some(document_id), Some(file)) = (document, to_index) {
                index_file(&orch, document_id, file).await?;
            }

            let inline_chunks = match inline {
                Some(path) => Some(load_inline(path)?),
                None => None,
            };

            let answer = orch
                .answer(document.as_deref(), question, inline_chunks.as_deref())
                .await;
            println!("{}", answer.text);
            info!("Answer source: {}", answer.source);
        }

        Commands::Chat { ref document, index_file: ref to_index } => {
            if let Some(file) = to_index {
                index_file(&orch, document, file).await?;
            }

            chat(&orch, document).await?;

            let stats = orch.stats();
            println!("Session Statistics:");
            println!("  Answers:        {}", stats.total());
            println!("  Exact hits:     {}", stats.exact_hits);
            println!("  Semantic hits:  {}", stats.semantic_hits);
            println!("  Synthesized:    {}", stats.synthesized);
            println!("  Degraded:       {}", stats.degraded);
            println!("  Cache hit rate: {:.1}%", stats.cache_hit_rate() * 100.0);
        }
    }

    Ok(())
}

async fn create_orchestrator(cli: &Cli, settings: &Settings) -> Result<QueryOrchestrator> {
    let embedder: Arc<dyn Embedder> = match settings.embedding_backend {
        EmbeddingBackend::Local => Arc::new(FastEmbedder::new()?),
        EmbeddingBackend::Remote => Arc::new(
            RemoteEmbedder::from_settings(settings).context("Failed to configure embeddings")?,
        ),
    };

    let index: Arc<dyn ChunkIndex> = match cli.index {
        IndexBackend::Lance => {
            std::fs::create_dir_all(&settings.data_dir)
                .with_context(|| format!("Failed to create {:?}", settings.data_dir))?;
            Arc::new(LanceChunkIndex::new(settings.data_dir.join("lancedb")).await?)
        }
        IndexBackend::Memory => Arc::new(MemoryChunkIndex::new()),
    };

    let generator =
        Arc::new(ChatClient::from_settings(settings).context("Failed to configure the LLM client")?);
    info!("Using model {} at {}", generator.model(), settings.llm_base_url);

    let orch = QueryOrchestrator::in_memory(
        OrchestratorConfig::from_settings(settings),
        embedder,
        generator,
        index,
    )?;
    Ok(orch)
}

async fn index_file(orch: &QueryOrchestrator, document_id: &str, file: &Path) -> Result<usize> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
    let count = orch
        .index_document(document_id, &text)
        .await
        .with_context(|| format!("Failed to index {}", document_id))?;
    Ok(count)
}

fn load_inline(path: &Path) -> Result<Vec<InlineChunk>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).context("Failed to parse inline chunks")
}

async fn chat(orch: &QueryOrchestrator, document_id: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Asking about {} (type 'exit' to quit)", document_id);
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let answer = orch.answer(Some(document_id), question, None).await;
        println!("{}\n", answer.text);
    }

    Ok(())
}
