//! Repositories for inventory storage

use async_trait::async_trait;
use auth::models::Page;
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::inventory::{Asset, AssetKind, AssetRecord};

pub mod inventory;

pub use inventory::{InMemoryInventory, PgInventoryRepository};

/// Both sides of an update
#[derive(Debug, Clone)]
pub struct AssetUpdate {
    pub before: Asset,
    pub after: Asset,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn create(&self, kind: AssetKind, record: &AssetRecord) -> DatabaseResult<Asset>;

    async fn get(&self, kind: AssetKind, id: Uuid) -> DatabaseResult<Option<Asset>>;

    /// Newest first, optionally restricted to one status, with the total count
    async fn list(
        &self,
        kind: AssetKind,
        status: Option<&str>,
        page: Page,
    ) -> DatabaseResult<(Vec<Asset>, i64)>;

    /// Replace the values of an asset and return the row before and after
    async fn update(
        &self,
        kind: AssetKind,
        id: Uuid,
        record: &AssetRecord,
    ) -> DatabaseResult<Option<AssetUpdate>>;

    /// Delete and return the removed row
    async fn delete(&self, kind: AssetKind, id: Uuid) -> DatabaseResult<Option<Asset>>;
}
