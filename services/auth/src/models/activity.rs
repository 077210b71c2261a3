//! Activity log model
//!
//! Entries are append-only. Callers diff old and new values themselves, usually
//! through [`ChangeSet`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Kind of inventory entity an entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Server,
    Vm,
    Service,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Server => "SERVER",
            EntityType::Vm => "VM",
            EntityType::Service => "SERVICE",
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SERVER" => Ok(EntityType::Server),
            "VM" => Ok(EntityType::Vm),
            "SERVICE" => Ok(EntityType::Service),
            other => Err(format!("Unknown entity type: {}", other)),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    StatusChanged,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "CREATED",
            ActivityAction::Updated => "UPDATED",
            ActivityAction::Deleted => "DELETED",
            ActivityAction::StatusChanged => "STATUS_CHANGED",
        }
    }
}

impl FromStr for ActivityAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(ActivityAction::Created),
            "UPDATED" => Ok(ActivityAction::Updated),
            "DELETED" => Ok(ActivityAction::Deleted),
            "STATUS_CHANGED" => Ok(ActivityAction::StatusChanged),
            other => Err(format!("Unknown activity action: {}", other)),
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field-level change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityChange {
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
}

/// Who performed a change. System-initiated changes have no actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub user_name: String,
}

/// Entry to append
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub entity_name: String,
    pub action: ActivityAction,
    pub changes: Vec<ActivityChange>,
    pub actor: Option<Actor>,
}

impl NewActivity {
    /// JSON form of the change list. Falls back to an empty array so a bad
    /// value never prevents the row from being written.
    pub fn changes_json(&self) -> Value {
        serde_json::to_value(&self.changes).unwrap_or_else(|e| {
            tracing::warn!("Failed to encode activity changes: {}", e);
            Value::Array(Vec::new())
        })
    }
}

/// Stored entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub entity_name: String,
    pub action: ActivityAction,
    pub changes: Vec<ActivityChange>,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Equality filters for searching the log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub action: Option<ActivityAction>,
}

impl ActivityFilter {
    pub fn matches(&self, entry: &ActivityLogEntry) -> bool {
        self.entity_type.is_none_or(|t| t == entry.entity_type)
            && self.entity_id.is_none_or(|id| id == entry.entity_id)
            && self.action.is_none_or(|a| a == entry.action)
    }
}

/// Search query string
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub action: Option<ActivityAction>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ActivityQuery {
    pub fn filter(&self) -> ActivityFilter {
        ActivityFilter {
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            action: self.action,
        }
    }
}

/// Builder for the change list of an update
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<ActivityChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `field` if its value differs between `old` and `new`
    pub fn track<T>(&mut self, field: &str, old: &T, new: &T) -> &mut Self
    where
        T: Serialize + PartialEq + ?Sized,
    {
        if old != new {
            self.changes.push(ActivityChange {
                field: field.to_string(),
                old_value: serde_json::to_value(old).unwrap_or(Value::Null),
                new_value: serde_json::to_value(new).unwrap_or(Value::Null),
            });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// True when `field` is the only changed field
    pub fn only(&self, field: &str) -> bool {
        self.changes.len() == 1 && self.changes[0].field == field
    }

    pub fn into_changes(self) -> Vec<ActivityChange> {
        self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn change_set_keeps_only_differences() {
        let mut changes = ChangeSet::new();
        changes
            .track("name", "web-01", "web-01")
            .track("status", "ACTIVE", "INACTIVE")
            .track("ipAddress", &Some("10.0.0.1"), &None::<&str>);

        assert!(!changes.only("status"));
        let changes = changes.into_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, "status");
        assert_eq!(changes[0].old_value, json!("ACTIVE"));
        assert_eq!(changes[1].new_value, Value::Null);
    }

    #[test]
    fn entries_serialize_in_camel_case() {
        let entry = ActivityLogEntry {
            id: Uuid::nil(),
            entity_type: EntityType::Vm,
            entity_id: Uuid::nil(),
            entity_name: "vm-7".to_string(),
            action: ActivityAction::StatusChanged,
            changes: vec![ActivityChange {
                field: "status".to_string(),
                old_value: json!("RUNNING"),
                new_value: json!("ERROR"),
            }],
            user_id: None,
            user_name: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["entityType"], "VM");
        assert_eq!(json["action"], "STATUS_CHANGED");
        assert_eq!(json["changes"][0]["oldValue"], "RUNNING");
        assert!(json["userId"].is_null());
    }

    #[test]
    fn filter_matches_on_every_set_field() {
        let entity_id = Uuid::new_v4();
        let entry = ActivityLogEntry {
            id: Uuid::new_v4(),
            entity_type: EntityType::Server,
            entity_id,
            entity_name: "db-1".to_string(),
            action: ActivityAction::Created,
            changes: vec![],
            user_id: None,
            user_name: None,
            created_at: Utc::now(),
        };

        assert!(ActivityFilter::default().matches(&entry));
        assert!(
            ActivityFilter {
                entity_type: Some(EntityType::Server),
                entity_id: Some(entity_id),
                action: None,
            }
            .matches(&entry)
        );
        assert!(
            !ActivityFilter {
                action: Some(ActivityAction::Deleted),
                ..Default::default()
            }
            .matches(&entry)
        );
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert_eq!("VM".parse::<EntityType>(), Ok(EntityType::Vm));
        assert!("vm".parse::<EntityType>().is_err());
        assert_eq!(
            "STATUS_CHANGED".parse::<ActivityAction>(),
            Ok(ActivityAction::StatusChanged)
        );
    }
}
