//! Overlapping fixed-size text windows for indexing

use crate::error::{RagError, Result};

/// Window size and overlap, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk size must be greater than 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits text into overlapping windows
///
/// A window ends at the last paragraph break inside it if there is one, else
/// the last line break, else the last whitespace, else exactly at
/// `chunk_size` characters. Consecutive windows share up to `chunk_overlap`
/// characters. Whitespace-only windows are dropped.
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let ChunkingConfig {
            chunk_size,
            chunk_overlap,
        } = self.config;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let hard_end = (start + chunk_size).min(total);
            let end = if hard_end == total {
                total
            } else {
                // A soft break must leave room to advance past the overlap
                let min_end = start + (chunk_overlap + 1).max(chunk_size / 2);
                find_break(&chars, min_end, hard_end).unwrap_or(hard_end)
            };

            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }

            if end >= total {
                break;
            }

            let next = end.saturating_sub(chunk_overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }
}

/// Best break position in `chars[min_end..hard_end]`, as an exclusive end
fn find_break(chars: &[char], min_end: usize, hard_end: usize) -> Option<usize> {
    if min_end >= hard_end {
        return None;
    }

    let window = min_end..hard_end;

    let paragraph = window
        .clone()
        .rev()
        .find(|&i| i >= 1 && chars[i - 1] == '\n' && chars[i] == '\n');
    if let Some(i) = paragraph {
        return Some(i + 1);
    }

    let line = window.clone().rev().find(|&i| chars[i] == '\n');
    if let Some(i) = line {
        return Some(i + 1);
    }

    window
        .rev()
        .find(|&i| chars[i].is_whitespace())
        .map(|i| i + 1)
}
