//! Notion connector: pages fetched through an MCP server rather than a
//! bespoke REST client, grounded in the teacher's `tools::mcp::McpClient`
//! and `original_source`'s `create_notion_page.py` tool (which shows the
//! title/content/page_id shape Notion pages take in this system).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{ConnectorError, ToolError};
use crate::tools::mcp::client::McpClient;

use super::{Connector, ConnectorType, NormalisedDoc, RawItem, Watermark, unique_identifier_hash};

fn map_mcp_err(e: ToolError) -> ConnectorError {
    ConnectorError::Upstream(e.to_string())
}

pub struct NotionConnector {
    mcp: McpClient,
}

impl NotionConnector {
    pub fn new(mcp_server_url: impl Into<String>) -> Self {
        Self {
            mcp: McpClient::new(mcp_server_url),
        }
    }
}

#[async_trait]
impl Connector for NotionConnector {
    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Notion
    }

    async fn validate(&self) -> Result<(), ConnectorError> {
        self.mcp.list_tools().await.map(|_| ()).map_err(map_mcp_err)
    }

    async fn discover(&self, watermark: Watermark) -> Result<Vec<RawItem>, ConnectorError> {
        let mut args = serde_json::json!({});
        if let Some(since) = watermark.since {
            args["since"] = Value::String(since.to_rfc3339());
        }

        let result = self
            .mcp
            .call_tool("list_pages", args)
            .await
            .map_err(map_mcp_err)?;

        let text = result
            .content
            .iter()
            .filter_map(|block| block.as_text())
            .collect::<Vec<_>>()
            .join("\n");

        let pages: Vec<Value> = serde_json::from_str(&text).unwrap_or_default();

        Ok(pages
            .into_iter()
            .filter_map(|page| {
                let remote_id = page.get("page_id").and_then(Value::as_str)?.to_string();
                let last_edited = page
                    .get("last_edited_time")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(Utc::now);

                Some(RawItem {
                    remote_id,
                    payload: page,
                    source_time: last_edited,
                })
            })
            .collect())
    }

    fn normalise(&self, item: RawItem) -> Result<NormalisedDoc, ConnectorError> {
        let title = item.payload.get("title").and_then(Value::as_str).unwrap_or("untitled").to_string();
        let content = item.payload.get("content").and_then(Value::as_str).unwrap_or("");
        let url = item.payload.get("url").and_then(Value::as_str).unwrap_or("");

        let source_markdown = format!("# {title}\n\n{content}\n\n{url}");

        Ok(NormalisedDoc {
            title,
            unique_identifier_hash: unique_identifier_hash(ConnectorType::Notion, &item.remote_id),
            document_type: ConnectorType::Notion.as_str().to_string(),
            document_metadata: serde_json::json!({ "url": url }),
            source_time: item.source_time,
            source_markdown,
        })
    }
}
