//! Inventory operations with their audit trail
//!
//! Every successful mutation queues an activity entry. A status change into
//! a critical state also queues a notification for every user.

use auth::{
    ActivityRecorder, AuthError, AuthResult, NotificationService,
    models::{
        ActivityAction, ChangeSet, NewActivity, NotificationDraft, Page, Paginated,
        Severity,
    },
    validation::validate_name,
};
use serde_json::json;
use std::{net::IpAddr, sync::Arc};
use tracing::info;
use uuid::Uuid;

use crate::{
    models::inventory::{Asset, AssetKind, AssetQuery, AssetRecord, NewAsset, UpdateAsset},
    repositories::InventoryStore,
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn InventoryStore>,
    activity: ActivityRecorder,
    notifications: NotificationService,
}

impl InventoryService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        activity: ActivityRecorder,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            activity,
            notifications,
        }
    }

    pub async fn list(&self, kind: AssetKind, query: &AssetQuery) -> AuthResult<Paginated<Asset>> {
        let page = Page::new(query.limit, query.offset, DEFAULT_LIMIT, MAX_LIMIT);
        let (items, total) = self
            .store
            .list(kind, query.status.as_deref(), page)
            .await?;

        Ok(Paginated::new(items, total, page))
    }

    pub async fn get(&self, kind: AssetKind, id: Uuid) -> AuthResult<Asset> {
        self.store
            .get(kind, id)
            .await?
            .ok_or_else(|| not_found(kind))
    }

    pub async fn create(
        &self,
        kind: AssetKind,
        payload: NewAsset,
        user_id: Uuid,
    ) -> AuthResult<Asset> {
        let record = AssetRecord {
            name: checked_name(&payload.name)?,
            status: checked_status(kind, payload.status.as_deref())?,
            ip_address: checked_ip(payload.ip_address)?,
        };

        let asset = self.store.create(kind, &record).await?;
        info!("Created {} {} ({})", kind.label(), asset.name, asset.id);

        self.audit(&asset, ActivityAction::Created, ChangeSet::new(), user_id);
        Ok(asset)
    }

    pub async fn update(
        &self,
        kind: AssetKind,
        id: Uuid,
        payload: UpdateAsset,
        user_id: Uuid,
    ) -> AuthResult<Asset> {
        let current = self.get(kind, id).await?;

        let record = AssetRecord {
            name: match payload.name {
                Some(name) => checked_name(&name)?,
                None => current.name,
            },
            status: match payload.status {
                Some(status) => checked_status(kind, Some(status.as_str()))?,
                None => current.status,
            },
            ip_address: match payload.ip_address {
                Some(ip) => checked_ip(Some(ip))?,
                None => current.ip_address,
            },
        };

        let update = self
            .store
            .update(kind, id, &record)
            .await?
            .ok_or_else(|| not_found(kind))?;
        let (before, after) = (update.before, update.after);

        let mut changes = ChangeSet::new();
        changes
            .track("name", &before.name, &after.name)
            .track("status", &before.status, &after.status)
            .track("ipAddress", &before.ip_address, &after.ip_address);

        if changes.is_empty() {
            return Ok(after);
        }

        let action = if changes.only("status") {
            ActivityAction::StatusChanged
        } else {
            ActivityAction::Updated
        };
        self.audit(&after, action, changes, user_id);

        if before.status != after.status && kind.is_critical(&after.status) {
            self.notifications
                .fan_out(status_alert(&after, &before.status));
        }

        Ok(after)
    }

    pub async fn delete(&self, kind: AssetKind, id: Uuid, user_id: Uuid) -> AuthResult<()> {
        let asset = self
            .store
            .delete(kind, id)
            .await?
            .ok_or_else(|| not_found(kind))?;
        info!("Deleted {} {} ({})", kind.label(), asset.name, asset.id);

        self.audit(&asset, ActivityAction::Deleted, ChangeSet::new(), user_id);
        Ok(())
    }

    fn audit(&self, asset: &Asset, action: ActivityAction, changes: ChangeSet, user_id: Uuid) {
        self.activity.record_by(
            user_id,
            NewActivity {
                entity_type: asset.kind.entity_type(),
                entity_id: asset.id,
                entity_name: asset.name.clone(),
                action,
                changes: changes.into_changes(),
                actor: None,
            },
        );
    }
}

fn status_alert(asset: &Asset, old_status: &str) -> NotificationDraft {
    let kind = asset.kind;
    NotificationDraft {
        kind: kind.notification_type(),
        severity: Severity::Critical,
        title: format!(
            "{} {} status changed to {}",
            kind.label(),
            asset.name,
            asset.status
        ),
        message: format!(
            "{} {} (ID: {}) status changed from {} to {}",
            kind.label(),
            asset.name,
            asset.id,
            old_status,
            asset.status
        ),
        metadata: json!({
            kind.id_key(): asset.id,
            "oldStatus": old_status,
            "newStatus": asset.status,
        }),
    }
}

fn not_found(kind: AssetKind) -> AuthError {
    AuthError::NotFound(format!("{} not found", kind.label()))
}

fn checked_name(name: &str) -> AuthResult<String> {
    validate_name("Name", name).map_err(AuthError::Validation)?;
    Ok(name.trim().to_string())
}

fn checked_status(kind: AssetKind, status: Option<&str>) -> AuthResult<String> {
    let status = status.unwrap_or(kind.default_status());
    if !kind.is_valid_status(status) {
        return Err(AuthError::Validation(format!(
            "Invalid {} status: {}. Expected one of {}",
            kind.label(),
            status,
            kind.statuses().join(", ")
        )));
    }
    Ok(status.to_string())
}

fn checked_ip(ip: Option<String>) -> AuthResult<Option<String>> {
    match ip {
        Some(ip) => {
            let parsed: IpAddr = ip
                .trim()
                .parse()
                .map_err(|_| AuthError::Validation(format!("Invalid IP address: {}", ip)))?;
            Ok(Some(parsed.to_string()))
        }
        None => Ok(None),
    }
}
