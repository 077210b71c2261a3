//! Storage traits and their PostgreSQL implementations
//!
//! Services depend on the traits through `Arc<dyn ...>` handles handed to
//! their constructors. `crate::memory::InMemoryStore` implements every trait
//! for tests and embedded use.

pub mod activity;
pub mod api_key;
pub mod notification;
pub mod role;
pub mod session;
pub mod user;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::{
    ActivityFilter, ActivityLogEntry, ApiKey, NewActivity, NewApiKey, NewNotification,
    NewRoleRecord, NewSession, NewUserRecord, Notification, NotificationFilter, Page, Permission,
    Role, Session, User, UserRole,
};

pub use activity::PgActivityRepository;
pub use api_key::PgApiKeyRepository;
pub use notification::PgNotificationRepository;
pub use role::PgRoleRepository;
pub use session::PgSessionRepository;
pub use user::PgUserRepository;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert the user and link it to `record.role`, atomically.
    ///
    /// Fails with `UniqueViolation` for a taken email and `MissingReference`
    /// for an unknown role.
    async fn create(&self, record: &NewUserRecord) -> DatabaseResult<User>;

    /// Lookup by sealed email
    async fn find_by_email(&self, sealed_email: &str) -> DatabaseResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>>;

    /// Every known user id, for notification fan-out
    async fn list_ids(&self) -> DatabaseResult<Vec<Uuid>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Owners of unexpired sessions whose token hash matches. More than one
    /// entry means the table is corrupt.
    async fn find_user_ids_by_token_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Vec<Uuid>>;

    /// Delete every session of the user and insert `session`, atomically
    async fn replace_for_user(&self, session: &NewSession) -> DatabaseResult<Session>;

    async fn delete_by_token_hash(&self, token_hash: &str) -> DatabaseResult<u64>;

    async fn count_for_user(&self, user_id: Uuid) -> DatabaseResult<i64>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn insert(&self, key: &NewApiKey) -> DatabaseResult<ApiKey>;

    /// Newest first
    async fn list_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<ApiKey>>;

    /// Delete by id and owner together. Returns the number of rows removed.
    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> DatabaseResult<u64>;

    /// Find the unexpired key with this hash and stamp `last_used_at = now`
    async fn validate_and_touch(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Option<ApiKey>>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn insert(&self, activity: &NewActivity) -> DatabaseResult<()>;

    /// Newest first, with the total number of matches
    async fn search(
        &self,
        filter: &ActivityFilter,
        page: Page,
    ) -> DatabaseResult<(Vec<ActivityLogEntry>, i64)>;

    async fn recent(&self, limit: i64) -> DatabaseResult<Vec<ActivityLogEntry>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: &NewNotification) -> DatabaseResult<Notification>;

    /// Newest first, with the total number of matches
    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: NotificationFilter,
        page: Page,
    ) -> DatabaseResult<(Vec<Notification>, i64)>;

    async fn unread_count(&self, user_id: Uuid) -> DatabaseResult<i64>;

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> DatabaseResult<u64>;

    async fn mark_all_read(&self, user_id: Uuid) -> DatabaseResult<u64>;

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> DatabaseResult<u64>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn list(&self) -> DatabaseResult<Vec<Role>>;

    /// Fails with `UniqueViolation` when the name is taken
    async fn create(&self, role: &NewRoleRecord) -> DatabaseResult<Role>;

    async fn delete(&self, id: Uuid) -> DatabaseResult<u64>;

    /// Fails with `MissingReference` for an unknown role or user and
    /// `UniqueViolation` when the link exists
    async fn assign(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<UserRole>;

    async fn unassign(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<u64>;

    /// Union of the permissions of every role the user holds
    async fn permissions_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<Permission>>;
}
