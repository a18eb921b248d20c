//! Search module for blograg
//!
//! Chunking, embedding and per-document vector retrieval of blog posts.

pub mod chunker;
pub mod embedding;
pub mod engine;
pub mod types;
pub mod vector;

pub use chunker::{ChunkingConfig, TextChunker};
pub use embedding::{Embedder, FastEmbedder, RemoteEmbedder};
pub use engine::{rank_inline, VectorRetriever};
pub use types::{Chunk, InlineChunk, ScoredChunk};
pub use vector::{ChunkIndex, LanceChunkIndex, MemoryChunkIndex};
