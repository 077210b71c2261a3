//! Servers and virtual machines
//!
//! Both kinds share one record shape and differ only in their status sets
//! and in which transitions are critical.

use auth::models::{EntityType, NotificationType, Permission};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SERVER_STATUSES: [&str; 5] = [
    "ACTIVE",
    "INACTIVE",
    "MAINTENANCE",
    "PROVISIONING",
    "DECOMMISSIONED",
];
const SERVER_CRITICAL: [&str; 3] = ["INACTIVE", "MAINTENANCE", "DECOMMISSIONED"];

const VM_STATUSES: [&str; 5] = ["RUNNING", "STOPPED", "PAUSED", "SUSPENDED", "ERROR"];
const VM_CRITICAL: [&str; 2] = ["ERROR", "STOPPED"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Server,
    Vm,
}

impl AssetKind {
    /// Human label used in notification text
    pub fn label(&self) -> &'static str {
        match self {
            AssetKind::Server => "Server",
            AssetKind::Vm => "VM",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            AssetKind::Server => "servers",
            AssetKind::Vm => "virtual_machines",
        }
    }

    /// Metadata key carrying the asset id in notifications
    pub fn id_key(&self) -> &'static str {
        match self {
            AssetKind::Server => "serverId",
            AssetKind::Vm => "vmId",
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            AssetKind::Server => EntityType::Server,
            AssetKind::Vm => EntityType::Vm,
        }
    }

    pub fn notification_type(&self) -> NotificationType {
        match self {
            AssetKind::Server => NotificationType::Server,
            AssetKind::Vm => NotificationType::Vm,
        }
    }

    pub fn statuses(&self) -> &'static [&'static str] {
        match self {
            AssetKind::Server => &SERVER_STATUSES,
            AssetKind::Vm => &VM_STATUSES,
        }
    }

    pub fn default_status(&self) -> &'static str {
        match self {
            AssetKind::Server => "ACTIVE",
            AssetKind::Vm => "RUNNING",
        }
    }

    pub fn is_valid_status(&self, status: &str) -> bool {
        self.statuses().contains(&status)
    }

    /// Whether moving into `status` warrants notifying every user
    pub fn is_critical(&self, status: &str) -> bool {
        match self {
            AssetKind::Server => SERVER_CRITICAL.contains(&status),
            AssetKind::Vm => VM_CRITICAL.contains(&status),
        }
    }

    pub fn read_permission(&self) -> Permission {
        match self {
            AssetKind::Server => Permission::ReadDevices,
            AssetKind::Vm => Permission::ReadVms,
        }
    }

    pub fn write_permission(&self) -> Permission {
        match self {
            AssetKind::Server => Permission::WriteDevices,
            AssetKind::Vm => Permission::WriteVms,
        }
    }

    pub fn delete_permission(&self) -> Permission {
        match self {
            AssetKind::Server => Permission::DeleteDevices,
            AssetKind::Vm => Permission::DeleteVms,
        }
    }
}

/// Stored server or VM
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: Uuid,
    #[serde(skip)]
    pub kind: AssetKind,
    pub name: String,
    pub status: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated values to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub name: String,
    pub status: String,
    pub ip_address: Option<String>,
}

/// Creation payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    pub name: String,
    pub status: Option<String>,
    pub ip_address: Option<String>,
}

/// Partial update payload. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAsset {
    pub name: Option<String>,
    pub status: Option<String>,
    pub ip_address: Option<String>,
}

/// List query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
