pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod search;
pub mod synth;

pub use config::{EmbeddingBackend, Settings};
pub use error::{RagError, Result};
pub use llm::{ChatClient, Message, TextGenerator};
pub use orchestrator::{Answer, AnswerSource, OrchestratorConfig, QueryOrchestrator, QueryStats};
pub use search::{
    Chunk, ChunkIndex, ChunkingConfig, Embedder, FastEmbedder, InlineChunk, LanceChunkIndex,
    MemoryChunkIndex, RemoteEmbedder, ScoredChunk, TextChunker, VectorRetriever,
};
pub use synth::{AnswerSynthesizer, NOT_FOUND, NO_INFORMATION};
