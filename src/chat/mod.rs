//! Chat Store (spec §3 / §4.J): ChatThread/ThreadMessage/Comment CRUD
//! with membership-based ACL enforcement, plus public sharing and
//! thread cloning.
//!
//! Grounded in the teacher's `workspace::Repository` call sites for the
//! raw-SQL persistence pattern; the ACL gate here is new, driven by
//! `Membership::can`.

pub mod sharing;

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::error::ChatError;
use crate::store::{
    Comment, MessageRole, NewChatThread, NewComment, NewThreadMessage, Repository, ThreadMessage,
    ThreadVisibility,
};

pub use sharing::ShareService;

/// Thread & message service: every call takes the acting `user_id` and
/// checks membership before touching a row, per §4.D's permission model.
pub struct ChatService {
    store: Arc<Repository>,
}

impl ChatService {
    pub fn new(store: Arc<Repository>) -> Self {
        Self { store }
    }

    async fn require_membership(
        &self,
        user_id: Uuid,
        search_space_id: Uuid,
        permission: &str,
    ) -> Result<(), ChatError> {
        let membership = self
            .store
            .get_membership(user_id, search_space_id)
            .await?
            .ok_or(ChatError::PermissionDenied)?;
        if membership.can(permission) {
            Ok(())
        } else {
            Err(ChatError::PermissionDenied)
        }
    }

    pub async fn create_thread(
        &self,
        user_id: Uuid,
        search_space_id: Uuid,
        visibility: ThreadVisibility,
    ) -> Result<Uuid, ChatError> {
        self.require_membership(user_id, search_space_id, "chat:write").await?;
        Ok(self
            .store
            .create_thread(NewChatThread {
                search_space_id,
                visibility,
                created_by_id: user_id,
            })
            .await?)
    }

    pub async fn list_messages(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
    ) -> Result<Vec<ThreadMessage>, ChatError> {
        let thread = self.store.get_thread(thread_id).await?;
        self.require_membership(user_id, thread.search_space_id, "chat:read").await?;
        Ok(self.store.list_messages(thread_id).await?)
    }

    /// Appends a plain-text message authored by `user_id`. Content is
    /// stored as a single `text` part so it matches the shape public
    /// snapshots serve (spec §6's `content_parts`).
    pub async fn post_message(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
        role: MessageRole,
        text: &str,
    ) -> Result<Uuid, ChatError> {
        let thread = self.store.get_thread(thread_id).await?;
        self.require_membership(user_id, thread.search_space_id, "chat:write").await?;

        let content = json!([{ "type": "text", "text": text }]);
        Ok(self
            .store
            .append_message(NewThreadMessage {
                thread_id,
                role,
                author_id: Some(user_id),
                content,
            })
            .await?)
    }

    pub async fn add_comment(
        &self,
        user_id: Uuid,
        thread_id: Uuid,
        message_id: Uuid,
        parent_id: Option<Uuid>,
        content: &str,
        mentions: Vec<Uuid>,
    ) -> Result<Uuid, ChatError> {
        let thread = self.store.get_thread(thread_id).await?;
        self.require_membership(user_id, thread.search_space_id, "chat:write").await?;

        Ok(self
            .store
            .insert_comment(NewComment {
                message_id,
                thread_id,
                parent_id,
                author_id: user_id,
                content: content.to_string(),
                mentions,
            })
            .await?)
    }

    pub async fn list_comments(&self, user_id: Uuid, thread_id: Uuid) -> Result<Vec<Comment>, ChatError> {
        let thread = self.store.get_thread(thread_id).await?;
        self.require_membership(user_id, thread.search_space_id, "chat:read").await?;
        Ok(self.store.list_comments(thread_id).await?)
    }

    /// Clones a thread (spec §4.J scenario 5): the clone starts
    /// `clone_pending`/`needs_history_bootstrap`, so the agent loads the
    /// copied history into its own checkpoint on the first new message
    /// rather than this call replaying it through the runtime.
    pub async fn clone_thread(&self, user_id: Uuid, source_thread_id: Uuid) -> Result<Uuid, ChatError> {
        let thread = self.store.get_thread(source_thread_id).await?;
        self.require_membership(user_id, thread.search_space_id, "chat:read").await?;
        Ok(self.store.clone_thread(source_thread_id, user_id).await?)
    }

    pub fn store(&self) -> &Arc<Repository> {
        &self.store
    }
}
