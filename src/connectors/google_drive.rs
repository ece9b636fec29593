//! Google connectors: Drive (file listing + export), Calendar (events),
//! and Gmail (messages) — three thin adapters over the same OAuth2
//! bearer-token REST shape, differing only in endpoint and normalisation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ConnectorError;

use super::oauth::OAuthCredentials;
use super::{Connector, ConnectorType, NormalisedDoc, RawItem, Watermark, unique_identifier_hash};

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

async fn google_get(
    http: &reqwest::Client,
    credentials: &OAuthCredentials,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, ConnectorError> {
    let resp = http
        .get(url)
        .bearer_auth(&credentials.access_token)
        .query(query)
        .send()
        .await
        .map_err(|e| ConnectorError::Upstream(e.to_string()))?;

    if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ConnectorError::InvalidCredentials {
            reason: "Google access token rejected".to_string(),
        });
    }
    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ConnectorError::RateLimited(std::time::Duration::from_secs(60)));
    }
    if !resp.status().is_success() {
        return Err(ConnectorError::Upstream(format!("unexpected status {}", resp.status())));
    }

    resp.json().await.map_err(|e| ConnectorError::Upstream(e.to_string()))
}

pub struct GoogleDriveConnector {
    http: reqwest::Client,
    credentials: OAuthCredentials,
}

impl GoogleDriveConnector {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
        }
    }
}

#[async_trait]
impl Connector for GoogleDriveConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::GoogleDrive
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        google_get(
            &self.http,
            &self.credentials,
            "https://www.googleapis.com/drive/v3/about",
            &[("fields", "user".to_string())],
        )
        .await
        .map(|_| ())
    }

    async fn discover(&self, watermark: Watermark) -> Result<Vec<RawItem>, ConnectorError> {
        let mut q = vec!["trashed = false".to_string()];
        if let Some(since) = watermark.since {
            q.push(format!("modifiedTime > '{}'", since.to_rfc3339()));
        }

        let body = google_get(
            &self.http,
            &self.credentials,
            "https://www.googleapis.com/drive/v3/files",
            &[
                ("q", q.join(" and ")),
                ("fields", "files(id,name,mimeType,modifiedTime,webViewLink)".to_string()),
                ("pageSize", "100".to_string()),
            ],
        )
        .await?;

        let files = body.get("files").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(files
            .into_iter()
            .filter_map(|file| {
                let remote_id = file.get("id")?.as_str()?.to_string();
                let modified = file.get("modifiedTime").and_then(Value::as_str).map(parse_rfc3339).unwrap_or_else(Utc::now);
                Some(RawItem {
                    remote_id,
                    payload: file,
                    source_time: modified,
                })
            })
            .collect())
    }

    fn normalise(&self, item: RawItem) -> Result<NormalisedDoc, ConnectorError> {
        let name = item.payload.get("name").and_then(Value::as_str).unwrap_or("untitled").to_string();
        let link = item.payload.get("webViewLink").and_then(Value::as_str).unwrap_or("");
        let source_markdown = format!("# {name}\n\n{link}");

        Ok(NormalisedDoc {
            title: name,
            unique_identifier_hash: unique_identifier_hash(ConnectorType::GoogleDrive, &item.remote_id),
            document_type: ConnectorType::GoogleDrive.as_str().to_string(),
            document_metadata: serde_json::json!({ "web_view_link": link }),
            source_time: item.source_time,
            source_markdown,
        })
    }
}

pub struct GoogleCalendarConnector {
    http: reqwest::Client,
    credentials: OAuthCredentials,
    calendar_id: String,
}

impl GoogleCalendarConnector {
    pub fn new(credentials: OAuthCredentials, calendar_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            calendar_id: calendar_id.into(),
        }
    }
}

#[async_trait]
impl Connector for GoogleCalendarConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::GoogleCalendar
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        google_get(
            &self.http,
            &self.credentials,
            &format!(
                "https://www.googleapis.com/calendar/v3/calendars/{}",
                self.calendar_id
            ),
            &[],
        )
        .await
        .map(|_| ())
    }

    async fn discover(&self, watermark: Watermark) -> Result<Vec<RawItem>, ConnectorError> {
        let mut query = vec![("singleEvents".to_string(), "true".to_string()), ("orderBy".to_string(), "updated".to_string())];
        if let Some(since) = watermark.since {
            query.push(("updatedMin".to_string(), since.to_rfc3339()));
        }
        let query: Vec<(&str, String)> = query.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

        let body = google_get(
            &self.http,
            &self.credentials,
            &format!(
                "https://www.googleapis.com/calendar/v3/calendars/{}/events",
                self.calendar_id
            ),
            &query,
        )
        .await?;

        let events = body.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(events
            .into_iter()
            .filter_map(|event| {
                let remote_id = event.get("id")?.as_str()?.to_string();
                let updated = event.get("updated").and_then(Value::as_str).map(parse_rfc3339).unwrap_or_else(Utc::now);
                Some(RawItem {
                    remote_id,
                    payload: event,
                    source_time: updated,
                })
            })
            .collect())
    }

    fn normalise(&self, item: RawItem) -> Result<NormalisedDoc, ConnectorError> {
        let summary = item.payload.get("summary").and_then(Value::as_str).unwrap_or("(no title)").to_string();
        let description = item.payload.get("description").and_then(Value::as_str).unwrap_or("");
        let start = item
            .payload
            .get("start")
            .and_then(|s| s.get("dateTime").or_else(|| s.get("date")))
            .and_then(Value::as_str)
            .unwrap_or("");

        let source_markdown = format!("# {summary}\n\n{start}\n\n{description}");

        Ok(NormalisedDoc {
            title: summary,
            unique_identifier_hash: unique_identifier_hash(ConnectorType::GoogleCalendar, &item.remote_id),
            document_type: ConnectorType::GoogleCalendar.as_str().to_string(),
            document_metadata: serde_json::json!({ "calendar_id": self.calendar_id, "start": start }),
            source_time: item.source_time,
            source_markdown,
        })
    }
}

pub struct GmailConnector {
    http: reqwest::Client,
    credentials: OAuthCredentials,
}

impl GmailConnector {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
        }
    }

    fn header(payload: &Value, name: &str) -> Option<String> {
        payload
            .get("payload")?
            .get("headers")?
            .as_array()?
            .iter()
            .find(|h| h.get("name").and_then(Value::as_str) == Some(name))?
            .get("value")?
            .as_str()
            .map(str::to_string)
    }
}

#[async_trait]
impl Connector for GmailConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Gmail
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        google_get(
            &self.http,
            &self.credentials,
            "https://gmail.googleapis.com/gmail/v1/users/me/profile",
            &[],
        )
        .await
        .map(|_| ())
    }

    async fn discover(&self, watermark: Watermark) -> Result<Vec<RawItem>, ConnectorError> {
        let mut q = Vec::new();
        if let Some(since) = watermark.since {
            q.push(format!("after:{}", since.timestamp()));
        }

        let list = google_get(
            &self.http,
            &self.credentials,
            "https://gmail.googleapis.com/gmail/v1/users/me/messages",
            &[("q", q.join(" ")), ("maxResults", "100".to_string())],
        )
        .await?;

        let mut items = Vec::new();
        for message_ref in list.get("messages").and_then(Value::as_array).cloned().unwrap_or_default() {
            let Some(id) = message_ref.get("id").and_then(Value::as_str) else {
                continue;
            };

            let full = google_get(
                &self.http,
                &self.credentials,
                &format!("https://gmail.googleapis.com/gmail/v1/users/me/messages/{id}"),
                &[("format", "full".to_string())],
            )
            .await?;

            let internal_date = full
                .get("internalDate")
                .and_then(Value::as_str)
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms))
                .unwrap_or_else(Utc::now);

            items.push(RawItem {
                remote_id: id.to_string(),
                payload: full,
                source_time: internal_date,
            });
        }

        Ok(items)
    }

    fn normalise(&self, item: RawItem) -> Result<NormalisedDoc, ConnectorError> {
        let subject = Self::header(&item.payload, "Subject").unwrap_or_else(|| "(no subject)".to_string());
        let from = Self::header(&item.payload, "From").unwrap_or_default();
        let snippet = item.payload.get("snippet").and_then(Value::as_str).unwrap_or("");

        let source_markdown = format!("# {subject}\n\nFrom: {from}\n\n{snippet}");

        Ok(NormalisedDoc {
            title: subject,
            unique_identifier_hash: unique_identifier_hash(ConnectorType::Gmail, &item.remote_id),
            document_type: ConnectorType::Gmail.as_str().to_string(),
            document_metadata: serde_json::json!({ "from": from }),
            source_time: item.source_time,
            source_markdown,
        })
    }
}
