//! Notification Bus (spec §4.L): the write side lives entirely in
//! [`crate::store::Repository`] — this module is the read/ack surface a
//! handler calls on a user's behalf. Delivery to a connected client is
//! out of this crate's scope (a replication mechanism streams table
//! inserts/updates in commit order); this crate only ever writes rows.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{NewNotification, Notification, Repository};

pub struct NotificationService {
    store: Arc<Repository>,
}

impl NotificationService {
    pub fn new(store: Arc<Repository>) -> Self {
        Self { store }
    }

    pub async fn notify(&self, notification: NewNotification) -> Result<Uuid, StoreError> {
        self.store.create_notification(notification).await
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        include_archived: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        self.store.list_notifications(user_id, include_archived, limit).await
    }

    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.store.mark_notification_read(id, user_id).await
    }

    pub async fn archive(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.store.archive_notification(id, user_id).await
    }
}
