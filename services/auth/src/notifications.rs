//! Notification service and fan-out

use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    models::{
        Notification, NotificationDraft, NotificationQuery, Page, Paginated,
    },
    repositories::{NotificationStore, UserStore},
    tasks::{Task, TaskQueue},
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

/// Per-user notification operations
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    tasks: TaskQueue,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, tasks: TaskQueue) -> Self {
        Self { store, tasks }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        query: &NotificationQuery,
    ) -> AuthResult<Paginated<Notification>> {
        let page = Page::new(query.limit, query.offset, DEFAULT_LIMIT, MAX_LIMIT);
        let (items, total) = self
            .store
            .list_for_user(user_id, query.filter(), page)
            .await?;

        Ok(Paginated::new(items, total, page))
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AuthResult<i64> {
        Ok(self.store.unread_count(user_id).await?)
    }

    /// Create a notification for a single user
    pub async fn create(&self, user_id: Uuid, draft: NotificationDraft) -> AuthResult<Notification> {
        if draft.title.trim().is_empty() {
            return Err(AuthError::Validation("Title is required".to_string()));
        }
        if draft.message.trim().is_empty() {
            return Err(AuthError::Validation("Message is required".to_string()));
        }
        Ok(self.store.insert(&draft.for_user(user_id)).await?)
    }

    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AuthResult<()> {
        match self.store.mark_read(id, user_id).await? {
            0 => Err(AuthError::NotFound("Notification not found".to_string())),
            _ => Ok(()),
        }
    }

    /// Returns how many notifications changed
    pub async fn mark_all_read(&self, user_id: Uuid) -> AuthResult<u64> {
        Ok(self.store.mark_all_read(user_id).await?)
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> AuthResult<()> {
        match self.store.delete_owned(id, user_id).await? {
            0 => Err(AuthError::NotFound("Notification not found".to_string())),
            _ => Ok(()),
        }
    }

    /// Queue one copy of `draft` for every known user. Never fails the caller.
    pub fn fan_out(&self, draft: NotificationDraft) -> bool {
        self.tasks.submit(Task::NotifyAllUsers(draft))
    }
}

/// Insert `draft` once per user. Errors are logged and skipped. Returns the
/// number of notifications written.
pub async fn deliver_to_all(
    users: &dyn UserStore,
    notifications: &dyn NotificationStore,
    draft: &NotificationDraft,
) -> usize {
    let user_ids = match users.list_ids().await {
        Ok(user_ids) => user_ids,
        Err(e) => {
            error!(error = %e, title = %draft.title, "Failed to list users for notification");
            return 0;
        }
    };

    let mut delivered = 0;
    for user_id in user_ids {
        match notifications.insert(&draft.for_user(user_id)).await {
            Ok(_) => delivered += 1,
            Err(e) => error!(error = %e, user_id = %user_id, "Failed to create notification"),
        }
    }

    info!("Delivered notification '{}' to {} users", draft.title, delivered);
    delivered
}
