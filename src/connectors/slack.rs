//! Slack connector: channel message history, OAuth2 authenticated.
//! Refreshes its bot token via [`super::oauth::OAuthClient`] when
//! `expires_at` is within the shared refresh margin.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::ConnectorError;

use super::oauth::OAuthCredentials;
use super::{Connector, ConnectorType, NormalisedDoc, RawItem, Watermark, unique_identifier_hash};

pub struct SlackConnector {
    http: reqwest::Client,
    credentials: OAuthCredentials,
    channel_id: String,
}

impl SlackConnector {
    pub fn new(credentials: OAuthCredentials, channel_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            channel_id: channel_id.into(),
        }
    }

    fn slack_ts_to_datetime(ts: &str) -> DateTime<Utc> {
        let secs: f64 = ts.parse().unwrap_or(0.0);
        Utc.timestamp_opt(secs as i64, 0).single().unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl Connector for SlackConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Slack
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        let resp = self
            .http
            .get("https://slack.com/api/auth.test")
            .bearer_auth(&self.credentials.access_token)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(e.to_string()))?;

        let body: Value = resp.json().await.map_err(|e| ConnectorError::Upstream(e.to_string()))?;
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            return Err(ConnectorError::InvalidCredentials {
                reason: body
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("auth.test failed")
                    .to_string(),
            });
        }
        Ok(())
    }

    async fn discover(&self, watermark: Watermark) -> Result<Vec<RawItem>, ConnectorError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("channel", self.channel_id.clone()), ("limit", "200".to_string())];
            if let Some(since) = watermark.since {
                query.push(("oldest", since.timestamp().to_string()));
            }
            if let Some(until) = watermark.until {
                query.push(("latest", until.timestamp().to_string()));
            }
            if let Some(ref c) = cursor {
                query.push(("cursor", c.clone()));
            }

            let resp = self
                .http
                .get("https://slack.com/api/conversations.history")
                .bearer_auth(&self.credentials.access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| ConnectorError::Upstream(e.to_string()))?;

            let body: Value = resp.json().await.map_err(|e| ConnectorError::Upstream(e.to_string()))?;

            if body.get("ok").and_then(Value::as_bool) != Some(true) {
                let err = body.get("error").and_then(Value::as_str).unwrap_or("unknown");
                if err == "ratelimited" {
                    return Err(ConnectorError::RateLimited(std::time::Duration::from_secs(30)));
                }
                return Err(ConnectorError::Upstream(err.to_string()));
            }

            let messages = body.get("messages").and_then(Value::as_array).cloned().unwrap_or_default();
            let is_empty = messages.is_empty();

            for message in messages {
                let ts = message.get("ts").and_then(Value::as_str).unwrap_or("0").to_string();
                let source_time = Self::slack_ts_to_datetime(&ts);
                items.push(RawItem {
                    remote_id: ts,
                    payload: message,
                    source_time,
                });
            }

            cursor = body
                .get("response_metadata")
                .and_then(|m| m.get("next_cursor"))
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string);

            if is_empty || cursor.is_none() {
                break;
            }
        }

        Ok(items)
    }

    fn normalise(&self, item: RawItem) -> Result<NormalisedDoc, ConnectorError> {
        let text = item.payload.get("text").and_then(Value::as_str).unwrap_or("").to_string();
        let user = item.payload.get("user").and_then(Value::as_str).unwrap_or("unknown");
        let title = format!("Slack message in #{}", self.channel_id);
        let source_markdown = format!("**{user}**: {text}");

        Ok(NormalisedDoc {
            title,
            unique_identifier_hash: unique_identifier_hash(ConnectorType::Slack, &item.remote_id),
            document_type: ConnectorType::Slack.as_str().to_string(),
            document_metadata: serde_json::json!({ "channel_id": self.channel_id, "user": user }),
            source_time: item.source_time,
            source_markdown,
        })
    }
}
