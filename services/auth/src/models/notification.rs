//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Server,
    Vm,
    Service,
    User,
    System,
    Api,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Server => "SERVER",
            NotificationType::Vm => "VM",
            NotificationType::Service => "SERVICE",
            NotificationType::User => "USER",
            NotificationType::System => "SYSTEM",
            NotificationType::Api => "API",
        }
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SERVER" => Ok(NotificationType::Server),
            "VM" => Ok(NotificationType::Vm),
            "SERVICE" => Ok(NotificationType::Service),
            "USER" => Ok(NotificationType::User),
            "SYSTEM" => Ok(NotificationType::System),
            "API" => Ok(NotificationType::Api),
            other => Err(format!("Unknown notification type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    #[default]
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            other => Err(format!("Unknown severity: {}", other)),
        }
    }
}

/// Stored notification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub metadata: Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification addressed to one user
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub metadata: Value,
}

/// Notification content not yet addressed. Also the body of a direct create.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDraft {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub severity: Severity,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Value,
}

impl NotificationDraft {
    pub fn for_user(&self, user_id: Uuid) -> NewNotification {
        NewNotification {
            user_id,
            kind: self.kind,
            severity: self.severity,
            title: self.title.clone(),
            message: self.message.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub unread: Option<bool>,
    pub kind: Option<NotificationType>,
}

impl NotificationFilter {
    pub fn matches(&self, notification: &Notification) -> bool {
        self.unread.is_none_or(|unread| unread != notification.is_read)
            && self.kind.is_none_or(|kind| kind == notification.kind)
    }
}

/// Listing query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    pub unread: Option<bool>,
    #[serde(rename = "type")]
    pub kind: Option<NotificationType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl NotificationQuery {
    pub fn filter(&self) -> NotificationFilter {
        NotificationFilter {
            unread: self.unread,
            kind: self.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unread_filter_selects_by_read_flag() {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: NotificationType::Vm,
            severity: Severity::Critical,
            title: "t".to_string(),
            message: "m".to_string(),
            metadata: json!({}),
            is_read: false,
            created_at: Utc::now(),
        };

        let unread_only = NotificationFilter {
            unread: Some(true),
            kind: None,
        };
        let read_only = NotificationFilter {
            unread: Some(false),
            kind: None,
        };
        assert!(unread_only.matches(&notification));
        assert!(!read_only.matches(&notification));
        assert!(
            !NotificationFilter {
                unread: None,
                kind: Some(NotificationType::Server),
            }
            .matches(&notification)
        );
    }

    #[test]
    fn wire_format_uses_type_and_lowercase_severity() {
        let draft = NotificationDraft {
            kind: NotificationType::Server,
            severity: Severity::Warning,
            title: "t".to_string(),
            message: "m".to_string(),
            metadata: json!({"serverId": "x"}),
        };
        let user_id = Uuid::new_v4();
        let addressed = draft.for_user(user_id);
        assert_eq!(addressed.user_id, user_id);
        assert_eq!(addressed.metadata["serverId"], "x");

        let parsed: NotificationDraft = serde_json::from_value(json!({
            "type": "SYSTEM",
            "title": "Maintenance",
            "message": "Tonight"
        }))
        .unwrap();
        assert_eq!(parsed.kind, NotificationType::System);
        assert_eq!(parsed.severity, Severity::Info);
        assert!(parsed.metadata.is_null());
    }
}
