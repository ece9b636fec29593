//! Connector Framework (spec §4.E): one shared interface over ~20
//! heterogeneous ingestion sources.
//!
//! Grounded in the teacher's `tools::mcp` client for the MCP-backed
//! adapter and in `original_source`'s per-connector Python modules
//! (`trello_connector.py`, `zendesk_connector.py`, `connector_auth.py`)
//! for the shape of pagination, auth, and OAuth refresh that every
//! adapter here reproduces in Rust.

pub mod github;
pub mod google_drive;
pub mod kind;
pub mod notion;
pub mod oauth;
pub mod registry;
pub mod slack;
pub mod template;
pub mod web_crawl;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub use kind::ConnectorType;
pub use registry::ConnectorRegistry;

use crate::error::ConnectorError;

/// One item fetched from upstream, not yet normalised. Adapters should
/// keep this as close to the raw API payload as practical so
/// `normalise` can be driven by [`template::TemplateConnector`] when
/// the shape is simple.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub remote_id: String,
    pub payload: Value,
    pub source_time: DateTime<Utc>,
}

/// Output of `normalise`, ready to become a [`crate::store::NewDocument`]
/// once the ingestion coordinator fills in `search_space_id` and
/// `created_by_id` and computes `content_hash`.
#[derive(Debug, Clone)]
pub struct NormalisedDoc {
    pub title: String,
    pub source_markdown: String,
    pub unique_identifier_hash: String,
    pub document_type: String,
    pub document_metadata: Value,
    pub source_time: DateTime<Utc>,
}

/// Discovery watermark: adapters only return items with `source_time`
/// strictly after `since`, and (for backfills) at or before `until`.
#[derive(Debug, Clone, Copy)]
pub struct Watermark {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn connector_type(&self) -> ConnectorType;

    /// `validate(credentials) -> ok | reason`. Called synchronously
    /// when a user adds/edits a connector, before it is persisted.
    async fn validate(&self) -> Result<(), ConnectorError>;

    /// `discover(credentials, since, until) -> Lazy<Iter<RawItem>>`.
    /// Adapters own pagination and rate-limit back-off internally and
    /// return the full page of items due for this watermark window.
    async fn discover(&self, watermark: Watermark) -> Result<Vec<RawItem>, ConnectorError>;

    /// `normalise(RawItem) -> NormalisedDoc`. Must not touch the
    /// Document Store.
    fn normalise(&self, item: RawItem) -> Result<NormalisedDoc, ConnectorError>;
}

/// `unique_identifier_hash = SHA-256(connector_type ∥ stable_remote_id)`.
pub fn unique_identifier_hash(connector_type: ConnectorType, remote_id: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(connector_type.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(remote_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// `content_hash = SHA-256(normalised_content)`.
pub fn content_hash(normalised_content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(normalised_content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_identifier_hash_is_stable_and_scoped_by_type() {
        let a = unique_identifier_hash(ConnectorType::Github, "issue-42");
        let b = unique_identifier_hash(ConnectorType::Slack, "issue-42");
        assert_eq!(a, unique_identifier_hash(ConnectorType::Github, "issue-42"));
        assert_ne!(a, b);
    }
}
