//! Public sharing (spec §4.J/§6): mint a `share_token`, build the
//! citation-stripped, tool-call-allow-listed snapshot payload, and serve
//! it back by token with no authentication.

use std::sync::{Arc, OnceLock};

use base64::Engine;
use rand::RngCore;
use regex::Regex;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ChatError;
use crate::store::{PublicChatSnapshot, Repository, ThreadMessage};

/// Tool-call parts surfaced to an anonymous reader. Anything else (e.g.
/// `retrieve`, `memory_read`, `create_notion_page`) is dropped from the
/// snapshot entirely.
const TOOL_CALL_ALLOW_LIST: &[&str] = &[
    "display_image",
    "link_preview",
    "generate_podcast",
    "scrape_webpage",
    "multi_link_preview",
];

pub struct ShareService {
    store: Arc<Repository>,
}

impl ShareService {
    pub fn new(store: Arc<Repository>) -> Self {
        Self { store }
    }

    /// Enables sharing and (re)builds the snapshot from the thread's
    /// current messages. Returns the share token.
    pub async fn enable(&self, user_id: Uuid, thread_id: Uuid) -> Result<String, ChatError> {
        let thread = self.store.get_thread(thread_id).await?;
        self.require_member(user_id, thread.search_space_id).await?;

        let token = thread.public_share_token.unwrap_or_else(generate_share_token);
        self.store
            .set_public_share(thread_id, true, Some(token.clone()))
            .await?;
        self.refresh_snapshot(thread_id, &token).await?;
        Ok(token)
    }

    pub async fn disable(&self, user_id: Uuid, thread_id: Uuid) -> Result<(), ChatError> {
        let thread = self.store.get_thread(thread_id).await?;
        self.require_member(user_id, thread.search_space_id).await?;
        self.store.set_public_share(thread_id, false, None).await?;
        Ok(())
    }

    /// Rebuilds the stored snapshot payload from the thread's live
    /// messages. Call after any append so a shared thread's snapshot
    /// doesn't silently go stale.
    pub async fn refresh_snapshot(&self, thread_id: Uuid, token: &str) -> Result<(), ChatError> {
        let messages = self.store.list_messages(thread_id).await?;
        let podcasts = self.store.list_podcast_notifications(thread_id).await?;
        let payload = build_snapshot_payload(&messages, &podcasts);
        self.store.create_snapshot(token, thread_id, &payload).await?;
        Ok(())
    }

    pub async fn get_snapshot(&self, token: &str) -> Result<PublicChatSnapshot, ChatError> {
        Ok(self.store.get_snapshot(token).await?)
    }

    async fn require_member(&self, user_id: Uuid, search_space_id: Uuid) -> Result<(), ChatError> {
        let membership = self
            .store
            .get_membership(user_id, search_space_id)
            .await?
            .ok_or(ChatError::PermissionDenied)?;
        if membership.can("chat:share") {
            Ok(())
        } else {
            Err(ChatError::PermissionDenied)
        }
    }
}

/// 32 random bytes, URL-safe base64 without padding, per §4.J.
fn generate_share_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Builds the exact public-snapshot payload shape from §6:
/// `{messages:[{role, content_parts, author_display}], podcasts:[...]}`.
fn build_snapshot_payload(
    messages: &[ThreadMessage],
    podcasts: &[crate::store::Notification],
) -> Value {
    let messages: Vec<Value> = messages
        .iter()
        .map(|m| {
            json!({
                "role": m.role.as_str(),
                "content_parts": sanitize_parts(&m.content),
                "author_display": { "name": "author", "avatar": Value::Null },
            })
        })
        .collect();

    let podcasts: Vec<Value> = podcasts
        .iter()
        .map(|n| {
            json!({
                "id": n.metadata.get("task_id").cloned().unwrap_or(Value::Null),
                "title": n.metadata.get("title").cloned().unwrap_or(Value::Null),
                "transcript": Value::Null,
                "file_ref": Value::Null,
            })
        })
        .collect();

    json!({ "messages": messages, "podcasts": podcasts })
}

/// Strips `[citation:doc-ID]` anchors from text parts and drops
/// tool-call parts whose name isn't in the allow-list.
fn sanitize_parts(content: &Value) -> Value {
    let Some(parts) = content.as_array() else {
        return json!([]);
    };

    let sanitized: Vec<Value> = parts
        .iter()
        .filter_map(|part| {
            let part_type = part.get("type").and_then(Value::as_str).unwrap_or("");
            match part_type {
                "tool-call" | "tool-result" => {
                    let name = part.get("tool-name").and_then(Value::as_str).unwrap_or("");
                    TOOL_CALL_ALLOW_LIST.contains(&name).then(|| part.clone())
                }
                "text" => {
                    let text = part.get("text").and_then(Value::as_str).unwrap_or("");
                    Some(json!({ "type": "text", "text": strip_citations(text) }))
                }
                _ => Some(part.clone()),
            }
        })
        .collect();

    Value::Array(sanitized)
}

fn citation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[citation:doc-[^\]]+\]").expect("valid citation regex"))
}

fn strip_citations(text: &str) -> String {
    citation_pattern().replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_citation_anchors() {
        let text = "Revenue grew 12% [citation:doc-42] last quarter.";
        assert_eq!(strip_citations(text), "Revenue grew 12%  last quarter.".trim_end());
        assert!(!strip_citations(text).contains("citation:"));
    }

    #[test]
    fn filters_tool_call_parts_to_allow_list() {
        let content = json!([
            { "type": "tool-call", "tool-name": "retrieve", "args": {} },
            { "type": "tool-call", "tool-name": "link_preview", "args": {} },
        ]);
        let sanitized = sanitize_parts(&content);
        let names: Vec<&str> = sanitized
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p.get("tool-name").and_then(Value::as_str).unwrap())
            .collect();
        assert_eq!(names, vec!["link_preview"]);
    }
}
