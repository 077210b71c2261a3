//! Server and VM storage

use async_trait::async_trait;
use auth::models::Page;
use chrono::Utc;
use common::{
    database::begin_serializable,
    error::{DatabaseError, DatabaseResult},
};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use std::{collections::HashMap, sync::RwLock};
use tracing::info;
use uuid::Uuid;

use super::{AssetUpdate, InventoryStore};
use crate::models::inventory::{Asset, AssetKind, AssetRecord};

const COLUMNS: &str = "id, name, status, ip_address, created_at, updated_at";

/// PostgreSQL inventory repository
#[derive(Clone)]
pub struct PgInventoryRepository {
    pool: PgPool,
}

impl PgInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_asset(kind: AssetKind, row: &PgRow) -> Asset {
    Asset {
        id: row.get("id"),
        kind,
        name: row.get("name"),
        status: row.get("status"),
        ip_address: row.get("ip_address"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn push_status(query: &mut QueryBuilder<'_, Postgres>, status: Option<&str>) {
    if let Some(status) = status {
        query.push(" WHERE status = ").push_bind(status.to_string());
    }
}

#[async_trait]
impl InventoryStore for PgInventoryRepository {
    async fn create(&self, kind: AssetKind, record: &AssetRecord) -> DatabaseResult<Asset> {
        info!("Creating {} {}", kind.label(), record.name);

        let row = sqlx::query(&format!(
            "INSERT INTO {} (name, status, ip_address) VALUES ($1, $2, $3) RETURNING {}",
            kind.table(),
            COLUMNS
        ))
        .bind(&record.name)
        .bind(&record.status)
        .bind(&record.ip_address)
        .fetch_one(&self.pool)
        .await?;

        Ok(map_asset(kind, &row))
    }

    async fn get(&self, kind: AssetKind, id: Uuid) -> DatabaseResult<Option<Asset>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            COLUMNS,
            kind.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| map_asset(kind, &row)))
    }

    async fn list(
        &self,
        kind: AssetKind,
        status: Option<&str>,
        page: Page,
    ) -> DatabaseResult<(Vec<Asset>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", kind.table()));
        push_status(&mut count, status);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM {}", COLUMNS, kind.table()));
        push_status(&mut query, status);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = query.build().fetch_all(&self.pool).await?;

        Ok((rows.iter().map(|row| map_asset(kind, row)).collect(), total))
    }

    async fn update(
        &self,
        kind: AssetKind,
        id: Uuid,
        record: &AssetRecord,
    ) -> DatabaseResult<Option<AssetUpdate>> {
        let mut tx = begin_serializable(&self.pool).await?;

        let Some(before) = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = $1 FOR UPDATE",
            COLUMNS,
            kind.table()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let after = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET name = $2, status = $3, ip_address = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            kind.table(),
            COLUMNS
        ))
        .bind(id)
        .bind(&record.name)
        .bind(&record.status)
        .bind(&record.ip_address)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(AssetUpdate {
            before: map_asset(kind, &before),
            after: map_asset(kind, &after),
        }))
    }

    async fn delete(&self, kind: AssetKind, id: Uuid) -> DatabaseResult<Option<Asset>> {
        info!("Deleting {} {}", kind.label(), id);

        let row = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1 RETURNING {}",
            kind.table(),
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| map_asset(kind, &row)))
    }
}

/// Inventory kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    assets: RwLock<HashMap<(AssetKind, Uuid), Asset>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> DatabaseError {
    DatabaseError::Integrity("inventory lock poisoned".to_string())
}

#[async_trait]
impl InventoryStore for InMemoryInventory {
    async fn create(&self, kind: AssetKind, record: &AssetRecord) -> DatabaseResult<Asset> {
        let now = Utc::now();
        let asset = Asset {
            id: Uuid::new_v4(),
            kind,
            name: record.name.clone(),
            status: record.status.clone(),
            ip_address: record.ip_address.clone(),
            created_at: now,
            updated_at: now,
        };

        self.assets
            .write()
            .map_err(|_| poisoned())?
            .insert((kind, asset.id), asset.clone());

        Ok(asset)
    }

    async fn get(&self, kind: AssetKind, id: Uuid) -> DatabaseResult<Option<Asset>> {
        Ok(self
            .assets
            .read()
            .map_err(|_| poisoned())?
            .get(&(kind, id))
            .cloned())
    }

    async fn list(
        &self,
        kind: AssetKind,
        status: Option<&str>,
        page: Page,
    ) -> DatabaseResult<(Vec<Asset>, i64)> {
        let mut matching: Vec<Asset> = self
            .assets
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|asset| asset.kind == kind)
            .filter(|asset| status.is_none_or(|status| asset.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();

        Ok((items, total))
    }

    async fn update(
        &self,
        kind: AssetKind,
        id: Uuid,
        record: &AssetRecord,
    ) -> DatabaseResult<Option<AssetUpdate>> {
        let mut assets = self.assets.write().map_err(|_| poisoned())?;

        let Some(asset) = assets.get_mut(&(kind, id)) else {
            return Ok(None);
        };

        let before = asset.clone();
        asset.name = record.name.clone();
        asset.status = record.status.clone();
        asset.ip_address = record.ip_address.clone();
        asset.updated_at = Utc::now();

        Ok(Some(AssetUpdate {
            before,
            after: asset.clone(),
        }))
    }

    async fn delete(&self, kind: AssetKind, id: Uuid) -> DatabaseResult<Option<Asset>> {
        Ok(self
            .assets
            .write()
            .map_err(|_| poisoned())?
            .remove(&(kind, id)))
    }
}
