//! Web-facing tools available to the agent and, in a restricted form,
//! to public chat viewers (spec §6's public-snapshot tool allow-list
//! names `scrape_webpage`, `link_preview`, `multi_link_preview`).
//!
//! Adapted from the teacher's general-purpose `HttpTool`, narrowed to
//! GET-only fetches and HTML-to-Markdown extraction rather than an
//! arbitrary-method request proxy, reusing the same readability +
//! markdown pipeline as the web-crawl connector.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::connectors::web_crawl::extract_markdown;
use crate::context::JobContext;
use crate::tools::tool::{Tool, ToolError, ToolOutput};

fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build reqwest client")
}

/// `scrape_webpage`: fetches a URL and returns its readable content as
/// Markdown, for the agent to read or cite from directly without first
/// ingesting the page as a connector document.
pub struct ScrapeWebpageTool {
    client: Client,
}

impl ScrapeWebpageTool {
    pub fn new() -> Self {
        Self { client: http_client() }
    }
}

impl Default for ScrapeWebpageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ScrapeWebpageTool {
    fn name(&self) -> &str {
        "scrape_webpage"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its readable content as Markdown, stripped of navigation \
         and ads."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The page to fetch." }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let url = params
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'url' parameter".to_string()))?;

        let html = fetch(&self.client, url).await?;
        let (title, markdown) = extract_markdown(&html, url)
            .map_err(|e| ToolError::ExecutionFailed(format!("extraction failed: {e}")))?;

        Ok(ToolOutput::success(
            serde_json::json!({ "url": url, "title": title, "markdown": markdown }),
            start.elapsed(),
        ))
    }

    fn requires_sanitization(&self) -> bool {
        true
    }
}

/// `link_preview`: a cheap metadata-only fetch (title, description,
/// image) for rendering a link card, without running full readability
/// extraction.
pub struct LinkPreviewTool {
    client: Client,
}

impl LinkPreviewTool {
    pub fn new() -> Self {
        Self { client: http_client() }
    }
}

impl Default for LinkPreviewTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for LinkPreviewTool {
    fn name(&self) -> &str {
        "link_preview"
    }

    fn description(&self) -> &str {
        "Fetch the title, description, and preview image for a single URL."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let url = params
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'url' parameter".to_string()))?;

        let html = fetch(&self.client, url).await?;
        let preview = preview_from_html(&html, url);

        Ok(ToolOutput::success(serde_json::to_value(&preview).unwrap_or_default(), start.elapsed()))
    }

    fn requires_sanitization(&self) -> bool {
        true
    }
}

/// `multi_link_preview`: batches [`LinkPreviewTool`] over several URLs
/// at once so the answer node can render a set of link cards from a
/// single tool call.
pub struct MultiLinkPreviewTool {
    client: Client,
}

impl MultiLinkPreviewTool {
    pub fn new() -> Self {
        Self { client: http_client() }
    }
}

impl Default for MultiLinkPreviewTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for MultiLinkPreviewTool {
    fn name(&self) -> &str {
        "multi_link_preview"
    }

    fn description(&self) -> &str {
        "Fetch title, description, and preview image for up to 10 URLs at once."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "urls": {
                    "type": "array",
                    "items": { "type": "string" },
                    "maxItems": 10
                }
            },
            "required": ["urls"]
        })
    }

    async fn execute(&self, params: serde_json::Value, _ctx: &JobContext) -> Result<ToolOutput, ToolError> {
        let start = std::time::Instant::now();
        let urls: Vec<String> = params
            .get("urls")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .ok_or_else(|| ToolError::InvalidParameters("missing 'urls' parameter".to_string()))?;

        let mut previews = Vec::with_capacity(urls.len());
        for url in urls.iter().take(10) {
            match fetch(&self.client, url).await {
                Ok(html) => previews.push(preview_from_html(&html, url)),
                Err(e) => previews.push(LinkPreview {
                    url: url.clone(),
                    title: None,
                    description: None,
                    image: None,
                    error: Some(e.to_string()),
                }),
            }
        }

        Ok(ToolOutput::success(
            serde_json::json!({ "previews": previews }),
            start.elapsed(),
        ))
    }

    fn requires_sanitization(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct LinkPreview {
    url: String,
    title: Option<String>,
    description: Option<String>,
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn fetch(client: &Client, url: &str) -> Result<String, ToolError> {
    let resp = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ToolError::Timeout(Duration::from_secs(30))
        } else {
            ToolError::ExternalService(e.to_string())
        }
    })?;
    resp.error_for_status()
        .map_err(|e| ToolError::ExternalService(e.to_string()))?
        .text()
        .await
        .map_err(|e| ToolError::ExternalService(format!("failed to read response body: {e}")))
}

fn meta_regex(property: &str) -> Regex {
    let escaped = regex::escape(property);
    Regex::new(&format!(
        r#"(?is)<meta[^>]+(?:property|name)\s*=\s*["']{escaped}["'][^>]+content\s*=\s*["']([^"']*)["']"#
    ))
    .unwrap()
}

fn cached_regex(slot: &'static OnceLock<Regex>, build: impl FnOnce() -> Regex) -> &'static Regex {
    slot.get_or_init(build)
}

fn preview_from_html(html: &str, url: &str) -> LinkPreview {
    static OG_TITLE: OnceLock<Regex> = OnceLock::new();
    static OG_DESCRIPTION: OnceLock<Regex> = OnceLock::new();
    static DESCRIPTION: OnceLock<Regex> = OnceLock::new();
    static OG_IMAGE: OnceLock<Regex> = OnceLock::new();
    static TITLE_TAG: OnceLock<Regex> = OnceLock::new();

    let title_tag = cached_regex(&TITLE_TAG, || Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
    let og_title = cached_regex(&OG_TITLE, || meta_regex("og:title"));
    let og_description = cached_regex(&OG_DESCRIPTION, || meta_regex("og:description"));
    let description = cached_regex(&DESCRIPTION, || meta_regex("description"));
    let og_image = cached_regex(&OG_IMAGE, || meta_regex("og:image"));

    let title = og_title
        .captures(html)
        .or_else(|| title_tag.captures(html))
        .map(|c| c[1].trim().to_string());
    let description = og_description
        .captures(html)
        .or_else(|| description.captures(html))
        .map(|c| c[1].trim().to_string());
    let image = og_image.captures(html).map(|c| c[1].trim().to_string());

    LinkPreview {
        url: url.to_string(),
        title,
        description,
        image,
        error: None,
    }
}
