//! Credential core models

pub mod activity;
pub mod api_key;
pub mod notification;
pub mod permission;
pub mod role;
pub mod session;
pub mod user;

use serde::Serialize;

// Re-export for convenience
pub use activity::{
    ActivityAction, ActivityChange, ActivityFilter, ActivityLogEntry, ActivityQuery, Actor,
    ChangeSet, EntityType, NewActivity,
};
pub use api_key::{ApiKey, ApiKeySummary, CreateApiKeyRequest, CreatedApiKey, NewApiKey};
pub use notification::{
    NewNotification, Notification, NotificationDraft, NotificationFilter, NotificationQuery,
    NotificationType, Severity,
};
pub use permission::{Permission, PermissionCategory, PermissionInfo, UnknownPermission};
pub use role::{NewRole, NewRoleRecord, Role, RoleAssignment, UserRole};
pub use session::{IssuedSession, NewSession, Session};
pub use user::{LoginCredentials, NewUser, NewUserRecord, User, UserProfile};

/// Limit/offset window for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Normalize a requested window. A limit outside `1..=max` falls back to
    /// `default`, and a negative offset becomes zero.
    pub fn new(limit: Option<i64>, offset: Option<i64>, default: i64, max: i64) -> Self {
        let limit = match limit {
            Some(limit) if limit > 0 && limit <= max => limit,
            _ => default,
        };
        let offset = offset.filter(|offset| *offset >= 0).unwrap_or(0);

        Self { limit, offset }
    }
}

/// One page of results plus the total number of matching rows
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}
