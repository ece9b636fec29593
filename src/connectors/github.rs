//! GitHub connector: issues and pull requests via the REST API,
//! API-key (personal access token) authenticated.
//!
//! Grounded in `original_source`'s `trello_connector.py` for the
//! "authenticate once, paginate with a fixed query-param/header set"
//! shape of a simple REST adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ConnectorError;

use super::{Connector, ConnectorType, NormalisedDoc, RawItem, Watermark, unique_identifier_hash};

pub struct GithubConnector {
    http: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
}

impl GithubConnector {
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    fn base_url(&self) -> String {
        format!("https://api.github.com/repos/{}/{}", self.owner, self.repo)
    }
}

#[async_trait]
impl Connector for GithubConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Github
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        let resp = self
            .http
            .get(self.base_url())
            .bearer_auth(&self.token)
            .header("User-Agent", "surfsense")
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ConnectorError::InvalidCredentials {
                reason: "token rejected by GitHub".to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(ConnectorError::Upstream(format!(
                "unexpected status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn discover(&self, watermark: Watermark) -> Result<Vec<RawItem>, ConnectorError> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut req = self
                .http
                .get(format!("{}/issues", self.base_url()))
                .bearer_auth(&self.token)
                .header("User-Agent", "surfsense")
                .query(&[("state", "all"), ("per_page", "100")])
                .query(&[("page", page.to_string())]);

            if let Some(since) = watermark.since {
                req = req.query(&[("since", since.to_rfc3339())]);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| ConnectorError::Upstream(e.to_string()))?;

            if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(ConnectorError::RateLimited(std::time::Duration::from_secs(60)));
            }
            if !resp.status().is_success() {
                return Err(ConnectorError::Upstream(format!(
                    "unexpected status {}",
                    resp.status()
                )));
            }

            let batch: Vec<Value> = resp.json().await.map_err(|e| ConnectorError::Upstream(e.to_string()))?;
            if batch.is_empty() {
                break;
            }

            for issue in &batch {
                let updated_at = issue
                    .get("updated_at")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(Utc::now);

                if let Some(until) = watermark.until {
                    if updated_at > until {
                        continue;
                    }
                }

                let remote_id = issue
                    .get("id")
                    .map(|v| v.to_string())
                    .unwrap_or_default();

                items.push(RawItem {
                    remote_id,
                    payload: issue.clone(),
                    source_time: updated_at,
                });
            }

            if batch.len() < 100 {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    fn normalise(&self, item: RawItem) -> Result<NormalisedDoc, ConnectorError> {
        let title = item
            .payload
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("untitled issue")
            .to_string();

        let number = item.payload.get("number").and_then(Value::as_i64).unwrap_or(0);
        let body = item.payload.get("body").and_then(Value::as_str).unwrap_or("");
        let html_url = item
            .payload
            .get("html_url")
            .and_then(Value::as_str)
            .unwrap_or("");

        let source_markdown = format!(
            "# {title}\n\n**#{number}** — {html_url}\n\n{body}",
        );

        Ok(NormalisedDoc {
            title,
            unique_identifier_hash: unique_identifier_hash(ConnectorType::Github, &item.remote_id),
            document_type: ConnectorType::Github.as_str().to_string(),
            document_metadata: serde_json::json!({
                "number": number,
                "html_url": html_url,
            }),
            source_time: item.source_time,
            source_markdown,
        })
    }
}
