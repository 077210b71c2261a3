//! Permission catalog
//!
//! Permissions are `<action>:<resource>` tokens drawn from a closed set. API
//! keys carry an ordered list of them; roles carry one too.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use tracing::warn;

/// A single permission from the closed catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "read:devices")]
    ReadDevices,
    #[serde(rename = "write:devices")]
    WriteDevices,
    #[serde(rename = "delete:devices")]
    DeleteDevices,
    #[serde(rename = "read:vms")]
    ReadVms,
    #[serde(rename = "write:vms")]
    WriteVms,
    #[serde(rename = "delete:vms")]
    DeleteVms,
    #[serde(rename = "read:services")]
    ReadServices,
    #[serde(rename = "write:services")]
    WriteServices,
    #[serde(rename = "delete:services")]
    DeleteServices,
    #[serde(rename = "read:notifications")]
    ReadNotifications,
    #[serde(rename = "write:notifications")]
    WriteNotifications,
    #[serde(rename = "read:activity")]
    ReadActivity,
    #[serde(rename = "read:roles")]
    ReadRoles,
    #[serde(rename = "write:roles")]
    WriteRoles,
    #[serde(rename = "read:users")]
    ReadUsers,
    #[serde(rename = "search")]
    Search,
    #[serde(rename = "manage:apikeys")]
    ManageApiKeys,
}

/// Display grouping for the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionCategory {
    DevicesAndServers,
    VirtualMachines,
    Services,
    Notifications,
    ActivityAndSearch,
    RolesAndUsers,
    ApiKeys,
}

impl PermissionCategory {
    pub fn label(&self) -> &'static str {
        match self {
            PermissionCategory::DevicesAndServers => "Devices & Servers",
            PermissionCategory::VirtualMachines => "Virtual Machines",
            PermissionCategory::Services => "Services",
            PermissionCategory::Notifications => "Notifications",
            PermissionCategory::ActivityAndSearch => "Activity & Search",
            PermissionCategory::RolesAndUsers => "Roles & Users",
            PermissionCategory::ApiKeys => "API Keys",
        }
    }
}

/// Raised when a string is not part of the catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl Permission {
    /// Every permission, in catalog order
    pub const ALL: [Permission; 17] = [
        Permission::ReadDevices,
        Permission::WriteDevices,
        Permission::DeleteDevices,
        Permission::ReadVms,
        Permission::WriteVms,
        Permission::DeleteVms,
        Permission::ReadServices,
        Permission::WriteServices,
        Permission::DeleteServices,
        Permission::ReadNotifications,
        Permission::WriteNotifications,
        Permission::ReadActivity,
        Permission::ReadRoles,
        Permission::WriteRoles,
        Permission::ReadUsers,
        Permission::Search,
        Permission::ManageApiKeys,
    ];

    /// Read-only set assigned to API keys created without explicit permissions.
    /// Role and user reads are administrative and must be requested explicitly.
    pub const DEFAULT_API_KEY: [Permission; 7] = [
        Permission::ReadDevices,
        Permission::ReadVms,
        Permission::ReadServices,
        Permission::ReadNotifications,
        Permission::ReadActivity,
        Permission::Search,
        Permission::ManageApiKeys,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadDevices => "read:devices",
            Permission::WriteDevices => "write:devices",
            Permission::DeleteDevices => "delete:devices",
            Permission::ReadVms => "read:vms",
            Permission::WriteVms => "write:vms",
            Permission::DeleteVms => "delete:vms",
            Permission::ReadServices => "read:services",
            Permission::WriteServices => "write:services",
            Permission::DeleteServices => "delete:services",
            Permission::ReadNotifications => "read:notifications",
            Permission::WriteNotifications => "write:notifications",
            Permission::ReadActivity => "read:activity",
            Permission::ReadRoles => "read:roles",
            Permission::WriteRoles => "write:roles",
            Permission::ReadUsers => "read:users",
            Permission::Search => "search",
            Permission::ManageApiKeys => "manage:apikeys",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Permission::ReadDevices => "View devices and servers",
            Permission::WriteDevices => "Create and update devices/servers",
            Permission::DeleteDevices => "Delete devices and servers",
            Permission::ReadVms => "View virtual machines",
            Permission::WriteVms => "Create and update virtual machines",
            Permission::DeleteVms => "Delete virtual machines",
            Permission::ReadServices => "View services",
            Permission::WriteServices => "Create and update services",
            Permission::DeleteServices => "Delete services",
            Permission::ReadNotifications => "View notifications",
            Permission::WriteNotifications => "Mark notifications as read/delete",
            Permission::ReadActivity => "View activity logs",
            Permission::ReadRoles => "View roles",
            Permission::WriteRoles => "Manage roles (admin only)",
            Permission::ReadUsers => "Search users",
            Permission::Search => "Use search functionality",
            Permission::ManageApiKeys => "Manage your API keys",
        }
    }

    pub fn category(&self) -> PermissionCategory {
        match self {
            Permission::ReadDevices | Permission::WriteDevices | Permission::DeleteDevices => {
                PermissionCategory::DevicesAndServers
            }
            Permission::ReadVms | Permission::WriteVms | Permission::DeleteVms => {
                PermissionCategory::VirtualMachines
            }
            Permission::ReadServices | Permission::WriteServices | Permission::DeleteServices => {
                PermissionCategory::Services
            }
            Permission::ReadNotifications | Permission::WriteNotifications => {
                PermissionCategory::Notifications
            }
            Permission::ReadActivity | Permission::Search => PermissionCategory::ActivityAndSearch,
            Permission::ReadRoles | Permission::WriteRoles | Permission::ReadUsers => {
                PermissionCategory::RolesAndUsers
            }
            Permission::ManageApiKeys => PermissionCategory::ApiKeys,
        }
    }

    pub fn is_default(&self) -> bool {
        Self::DEFAULT_API_KEY.contains(self)
    }

    /// The full catalog, as shown to users choosing key permissions
    pub fn catalog() -> Vec<PermissionInfo> {
        Self::ALL
            .iter()
            .map(|permission| PermissionInfo {
                value: *permission,
                label: permission.description(),
                category: permission.category().label(),
                is_default: permission.is_default(),
            })
            .collect()
    }

    /// Parse a list of user-supplied strings, rejecting the first unknown one
    pub fn parse_all<S: AsRef<str>>(values: &[S]) -> Result<Vec<Permission>, UnknownPermission> {
        values.iter().map(|value| value.as_ref().parse()).collect()
    }

    /// Decode a stored JSON array. Unknown entries grant nothing and are skipped.
    pub fn from_stored(value: &serde_json::Value) -> Vec<Permission> {
        let Some(entries) = value.as_array() else {
            warn!("Stored permission set is not a JSON array");
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| match entry.as_str().map(str::parse::<Permission>) {
                Some(Ok(permission)) => Some(permission),
                _ => {
                    warn!("Ignoring unrecognised stored permission: {}", entry);
                    None
                }
            })
            .collect()
    }

    /// Encode a permission list as a JSON array of strings
    pub fn to_stored(permissions: &[Permission]) -> serde_json::Value {
        serde_json::Value::Array(
            permissions
                .iter()
                .map(|permission| serde_json::Value::String(permission.as_str().to_string()))
                .collect(),
        )
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|permission| permission.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Catalog entry as exposed over HTTP
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionInfo {
    pub value: Permission,
    pub label: &'static str,
    pub category: &'static str,
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_round_trip_through_the_catalog() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>(), Ok(permission));
            assert_eq!(
                serde_json::to_value(permission).unwrap(),
                serde_json::json!(permission.as_str())
            );
        }
    }

    #[test]
    fn unknown_strings_are_rejected() {
        assert_eq!(
            "admin:everything".parse::<Permission>(),
            Err(UnknownPermission("admin:everything".to_string()))
        );
        assert!(Permission::parse_all(&["read:vms", "READ:VMS"]).is_err());
        assert_eq!(
            Permission::parse_all(&["read:vms", "search"]).unwrap(),
            vec![Permission::ReadVms, Permission::Search]
        );
    }

    #[test]
    fn stored_sets_skip_unknown_entries() {
        let stored = serde_json::json!(["read:devices", "write:everything", 42, "search"]);
        assert_eq!(
            Permission::from_stored(&stored),
            vec![Permission::ReadDevices, Permission::Search]
        );
        assert!(Permission::from_stored(&serde_json::json!({"read:devices": true})).is_empty());
    }

    #[test]
    fn catalog_marks_defaults_and_categories() {
        let catalog = Permission::catalog();
        assert_eq!(catalog.len(), Permission::ALL.len());

        let defaults: Vec<_> = catalog.iter().filter(|info| info.is_default).collect();
        assert_eq!(defaults.len(), Permission::DEFAULT_API_KEY.len());

        let search = catalog
            .iter()
            .find(|info| info.value == Permission::Search)
            .unwrap();
        assert_eq!(search.category, "Activity & Search");
        assert_eq!(search.label, "Use search functionality");

        let json = serde_json::to_value(&catalog[0]).unwrap();
        assert_eq!(json["value"], "read:devices");
        assert_eq!(json["isDefault"], true);
    }
}
