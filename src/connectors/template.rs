//! Declarative "JSONata-style" transform for sources not worth a
//! bespoke adapter (spec §4.E / §9).
//!
//! There is no embedded scripting runtime in this crate's stack, so the
//! spec's "fallback-Python" escape hatch becomes a fallback Rust
//! closure registered per connector kind at startup (an Open Question
//! decision, recorded in DESIGN.md) — the declarative path covers dotted
//! field paths and a single array-map, the closure covers anything more
//! exotic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ConnectorError;

use super::{Connector, ConnectorType, NormalisedDoc, RawItem, Watermark};

pub type NormaliseFallback = dyn Fn(&Value) -> Result<NormalisedDoc, ConnectorError> + Send + Sync;

/// A single field mapping: a dotted path into the raw payload (e.g.
/// `"fields.Name"`), optionally joined across an array with `[]`
/// (e.g. `"comments[].body"` joins each element's `body` with `\n\n`).
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub target: String,
    pub path: String,
}

#[derive(Clone)]
pub struct TemplateSpec {
    pub source_id_field: String,
    pub title_field: FieldMapping,
    pub body_fields: Vec<FieldMapping>,
    pub document_type: String,
}

pub struct TemplateConnector {
    spec: TemplateSpec,
    base_url: String,
    http: reqwest::Client,
    fallback: Option<Box<NormaliseFallback>>,
}

impl TemplateConnector {
    pub fn new(spec: TemplateSpec, base_url: impl Into<String>) -> Self {
        Self {
            spec,
            base_url: base_url.into(),
            http: reqwest::Client::new(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<NormaliseFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Builds a connector straight from a connector record's decrypted
    /// config, which must carry `base_url`, `source_id_field`,
    /// `title_field`, `body_fields` (array of `{target, path}`), and
    /// `document_type`.
    pub fn from_config(config: &Value) -> Result<Self, ConnectorError> {
        let base_url = config
            .get("base_url")
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectorError::Template("missing base_url".to_string()))?
            .to_string();

        let source_id_field = config
            .get("source_id_field")
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectorError::Template("missing source_id_field".to_string()))?
            .to_string();

        let title_field = FieldMapping {
            target: "title".to_string(),
            path: config
                .get("title_field")
                .and_then(Value::as_str)
                .ok_or_else(|| ConnectorError::Template("missing title_field".to_string()))?
                .to_string(),
        };

        let body_fields = config
            .get("body_fields")
            .and_then(Value::as_array)
            .ok_or_else(|| ConnectorError::Template("missing body_fields".to_string()))?
            .iter()
            .map(|v| {
                Ok(FieldMapping {
                    target: v
                        .get("target")
                        .and_then(Value::as_str)
                        .ok_or_else(|| ConnectorError::Template("body_fields entry missing target".to_string()))?
                        .to_string(),
                    path: v
                        .get("path")
                        .and_then(Value::as_str)
                        .ok_or_else(|| ConnectorError::Template("body_fields entry missing path".to_string()))?
                        .to_string(),
                })
            })
            .collect::<Result<Vec<_>, ConnectorError>>()?;

        let document_type = config
            .get("document_type")
            .and_then(Value::as_str)
            .unwrap_or("template")
            .to_string();

        Ok(Self::new(
            TemplateSpec {
                source_id_field,
                title_field,
                body_fields,
                document_type,
            },
            base_url,
        ))
    }
}

#[async_trait]
impl Connector for TemplateConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Template
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

    async fn discover(&self, watermark: Watermark) -> Result<Vec<RawItem>, ConnectorError> {
        let resp = self
            .http
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(e.to_string()))?
            .error_for_status()
            .map_err(|e| ConnectorError::Upstream(e.to_string()))?
            .json::<Value>()
            .await
            .map_err(|e| ConnectorError::Upstream(e.to_string()))?;

        let items = resp.as_array().cloned().unwrap_or_default();
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let remote_id = resolve_path(&item, &self.spec.source_id_field)
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let source_time = item
                .get("updated_at")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            if let Some(since) = watermark.since {
                if source_time <= since {
                    continue;
                }
            }
            if let Some(until) = watermark.until {
                if source_time > until {
                    continue;
                }
            }

            out.push(RawItem {
                remote_id,
                payload: item,
                source_time,
            });
        }
        Ok(out)
    }

    fn normalise(&self, item: RawItem) -> Result<NormalisedDoc, ConnectorError> {
        if !self.spec.body_fields.is_empty() {
            return self.normalise_declarative(item);
        }
        if let Some(ref fallback) = self.fallback {
            return fallback(&item.payload);
        }
        Err(ConnectorError::Template(
            "no body_fields configured and no fallback registered".to_string(),
        ))
    }
}

impl TemplateConnector {
    fn normalise_declarative(&self, item: RawItem) -> Result<NormalisedDoc, ConnectorError> {
        let title = resolve_path(&item.payload, &self.spec.title_field.path)
            .and_then(value_to_string)
            .unwrap_or_else(|| item.remote_id.clone());

        let mut sections: HashMap<&str, String> = HashMap::new();
        for field in &self.spec.body_fields {
            let rendered = resolve_path(&item.payload, &field.path)
                .and_then(value_to_string)
                .unwrap_or_default();
            sections.insert(field.target.as_str(), rendered);
        }

        let source_markdown = self
            .spec
            .body_fields
            .iter()
            .map(|f| sections.remove(f.target.as_str()).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(NormalisedDoc {
            title,
            source_markdown,
            unique_identifier_hash: super::unique_identifier_hash(ConnectorType::Template, &item.remote_id),
            document_type: self.spec.document_type.clone(),
            document_metadata: serde_json::json!({ "remote_id": item.remote_id }),
            source_time: item.source_time,
        })
    }
}

/// Resolves a dotted path, with an optional trailing `[]` array-map
/// segment: `"comments[].body"` maps `.body` over the `comments` array
/// and joins the results with `\n\n`.
fn resolve_path<'a>(payload: &'a Value, path: &str) -> Option<Value> {
    if let Some((array_path, field)) = path.split_once("[].") {
        let array = navigate(payload, array_path)?.as_array()?.clone();
        let joined = array
            .iter()
            .filter_map(|element| navigate(element, field))
            .filter_map(|v| value_to_string(v.clone()))
            .collect::<Vec<_>>()
            .join("\n\n");
        return Some(Value::String(joined));
    }
    navigate(payload, path)
}

fn navigate<'a>(value: &'a Value, path: &str) -> Option<Value> {
    let mut current = value;
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        current = current.get(segment)?;
    }
    Some(current.clone())
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_dotted_path() {
        let payload = serde_json::json!({ "fields": { "Name": "Widget" } });
        let resolved = resolve_path(&payload, "fields.Name").unwrap();
        assert_eq!(resolved.as_str(), Some("Widget"));
    }

    #[test]
    fn resolves_array_map_and_joins() {
        let payload = serde_json::json!({
            "comments": [{ "body": "first" }, { "body": "second" }]
        });
        let resolved = resolve_path(&payload, "comments[].body").unwrap();
        assert_eq!(resolved.as_str(), Some("first\n\nsecond"));
    }

    #[test]
    fn missing_path_returns_none() {
        let payload = serde_json::json!({ "fields": {} });
        assert!(resolve_path(&payload, "fields.Missing").is_none());
    }
}
