//! Embedding provider seam (spec §4.A/4.B): turns chunk/document/query
//! text into dense vectors for pgvector similarity search.
//!
//! Grounded in the teacher's `workspace::embeddings::EmbeddingProvider`
//! (a `dyn`-safe async trait held behind an `Arc` on the workspace),
//! generalized so a single provider instance is shared process-wide via
//! [`crate::context::AppContext`] rather than constructed per workspace.

use async_trait::async_trait;

use crate::error::IngestionError;

pub const EMBEDDING_DIM: usize = 1536;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IngestionError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestionError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// OpenAI-compatible `/v1/embeddings` client. Works against OpenAI
/// itself or any self-hosted gateway that mirrors its request shape
/// (the pattern the connector adapters and the summariser also use for
/// their own upstream calls).
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn embed_raw(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, IngestionError> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            model: &'a str,
            input: &'a [String],
        }

        #[derive(serde::Deserialize)]
        struct Resp {
            data: Vec<Item>,
        }
        #[derive(serde::Deserialize)]
        struct Item {
            embedding: Vec<f32>,
            index: usize,
        }

        let resp = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&Req {
                model: &self.model,
                input: inputs,
            })
            .send()
            .await
            .map_err(|e| IngestionError::Embedding(e.to_string()))?
            .error_for_status()
            .map_err(|e| IngestionError::Embedding(e.to_string()))?
            .json::<Resp>()
            .await
            .map_err(|e| IngestionError::Embedding(e.to_string()))?;

        let mut vectors = vec![Vec::new(); inputs.len()];
        for item in resp.data {
            if let Some(slot) = vectors.get_mut(item.index) {
                *slot = item.embedding;
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IngestionError> {
        let mut vectors = self.embed_raw(&[text.to_string()]).await?;
        Ok(vectors.pop().unwrap_or_default())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IngestionError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.embed_raw(texts).await
    }
}
