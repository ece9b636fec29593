//! Document Summariser (spec §4.D): reduces a document's normalised
//! Markdown to the text persisted as its canonical `content`, plus the
//! embedding stored on `documents.embedding` for document-level
//! (non-chunk) semantic hits.

use std::sync::Arc;

use crate::embedder::EmbeddingProvider;
use crate::error::IngestionError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

const SYSTEM_PROMPT: &str = "Summarise the following document in 2-4 sentences, preserving \
     concrete facts, names, and numbers. Do not invent information that is not present.";

pub struct Summariser {
    llm: Arc<dyn LlmProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl Summariser {
    pub fn new(llm: Arc<dyn LlmProvider>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { llm, embeddings }
    }

    /// `summarise(markdown, metadata) -> (summary_text, summary_embedding)`.
    pub async fn summarise(
        &self,
        markdown: &str,
        title: &str,
    ) -> Result<(String, Vec<f32>), IngestionError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!("Title: {title}\n\n{markdown}")),
        ])
        .with_max_tokens(256)
        .with_temperature(0.2);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| IngestionError::Embedding(e.to_string()))?;

        let summary = if response.content.trim().is_empty() {
            truncate(markdown, 500)
        } else {
            response.content
        };

        let embedding = self.embeddings.embed(&summary).await?;
        Ok((summary, embedding))
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }
    let end = (0..=max_chars).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "hello world";
        assert_eq!(truncate(s, 5), "hello...");
        assert_eq!(truncate(s, 100), "hello world");
    }
}
