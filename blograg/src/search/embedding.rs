//! Embedding generation for vector search
//!
//! Questions go through [`Embedder::embed_one`], document chunks through
//! [`Embedder::embed_many`]; both must return vectors of the same dimension.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{RagError, Result};

/// Text embedding capability
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a question
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed document chunks, preserving order
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Local fastembed model
pub struct FastEmbedder {
    model: Arc<TextEmbedding>,
    dimension: usize,
}

impl FastEmbedder {
    /// Create a new embedder with the multilingual E5 model
    pub fn new() -> Result<Self> {
        Self::with_model(EmbeddingModel::MultilingualE5Small)
    }

    /// Create with a specific model
    pub fn with_model(model_name: EmbeddingModel) -> Result<Self> {
        info!("Initializing embedding model: {:?}", model_name);

        let dimension = match model_name {
            EmbeddingModel::MultilingualE5Small => 384,
            EmbeddingModel::MultilingualE5Base => 768,
            EmbeddingModel::MultilingualE5Large => 1024,
            EmbeddingModel::AllMiniLML6V2 => 384,
            EmbeddingModel::BGESmallENV15 => 384,
            EmbeddingModel::BGEBaseENV15 => 768,
            _ => 384, // default
        };

        let mut options = InitOptions::default();
        options.model_name = model_name;
        options.show_download_progress = true;

        let model = TextEmbedding::try_new(options)
            .map_err(|e| RagError::Embedding(format!("failed to initialize model: {}", e)))?;

        Ok(Self {
            model: Arc::new(model),
            dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    async fn run(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = self.model.clone();
        tokio::task::spawn_blocking(move || model.embed(inputs, None))
            .await
            .map_err(|e| RagError::Embedding(format!("embedding task failed: {}", e)))?
            .map_err(|e| RagError::Embedding(e.to_string()))
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        // E5 models expect "query: " prefix for queries
        self.run(vec![format!("query: {}", text)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("no embedding generated".into()))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        // E5 models expect "passage: " prefix for documents
        let inputs = texts.iter().map(|t| format!("passage: {}", t)).collect();
        self.run(inputs).await
    }
}

/// OpenAI-compatible `/embeddings` endpoint
pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl RemoteEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.llm_base_url.clone(),
            settings.embedding_model.clone(),
            settings.require_api_key()?,
            settings.request_timeout,
        )
    }

    /// Resolve the embeddings endpoint from the base URL
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/embeddings") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/embeddings", base)
        } else {
            format!("{}/v1/embeddings", base)
        }
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!("{}: {}", status, text)));
        }

        let payload: Value = resp.json().await?;
        let data = payload["data"]
            .as_array()
            .ok_or_else(|| RagError::Embedding("response has no data array".into()))?;

        // Entries carry their input position; order by it
        let mut indexed: Vec<(usize, Vec<f32>)> = data
            .iter()
            .enumerate()
            .map(|(pos, item)| {
                let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
                let vector = item["embedding"]
                    .as_array()
                    .map(|vals| vals.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
                    .unwrap_or_default();
                (index, vector)
            })
            .collect();
        indexed.sort_by_key(|(index, _)| *index);

        let vectors: Vec<Vec<f32>> = indexed.into_iter().map(|(_, v)| v).collect();
        if vectors.len() != inputs.len() || vectors.iter().any(|v| v.is_empty()) {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {} usable",
                inputs.len(),
                vectors.iter().filter(|v| !v.is_empty()).count()
            )));
        }

        debug!("Embedded {} inputs with {}", inputs.len(), self.model);
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("no embedding generated".into()))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}
