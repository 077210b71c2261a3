//! API key repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    database::begin_serializable,
    error::{DatabaseError, DatabaseResult},
};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::ApiKeyStore;
use crate::models::{ApiKey, NewApiKey, Permission};

/// PostgreSQL API key repository
#[derive(Clone)]
pub struct PgApiKeyRepository {
    pool: PgPool,
}

impl PgApiKeyRepository {
    /// Create a new API key repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_api_key(row: &PgRow) -> ApiKey {
    let permissions: serde_json::Value = row.get("permissions");

    ApiKey {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        key_hash: row.get("key_hash"),
        key_prefix: row.get("key_prefix"),
        permissions: Permission::from_stored(&permissions),
        last_used_at: row.get("last_used_at"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyRepository {
    async fn insert(&self, key: &NewApiKey) -> DatabaseResult<ApiKey> {
        info!("Creating API key '{}' for user: {}", key.name, key.user_id);

        let mut tx = begin_serializable(&self.pool).await?;

        let row = sqlx::query(
            r#"
            INSERT INTO api_keys (user_id, name, key_hash, key_prefix, permissions, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, name, key_hash, key_prefix, permissions, last_used_at,
                      expires_at, created_at, updated_at
            "#,
        )
        .bind(key.user_id)
        .bind(&key.name)
        .bind(&key.key_hash)
        .bind(&key.key_prefix)
        .bind(Permission::to_stored(&key.permissions))
        .bind(key.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(map_api_key(&row))
    }

    async fn list_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<ApiKey>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, key_hash, key_prefix, permissions, last_used_at,
                   expires_at, created_at, updated_at
            FROM api_keys
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_api_key).collect())
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> DatabaseResult<u64> {
        info!("Revoking API key {} for user: {}", id, user_id);

        let mut tx = begin_serializable(&self.pool).await?;

        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn validate_and_touch(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Option<ApiKey>> {
        let mut tx = begin_serializable(&self.pool).await?;

        let rows = sqlx::query(
            r#"
            UPDATE api_keys
            SET last_used_at = $2
            WHERE key_hash = $1 AND (expires_at IS NULL OR expires_at > $2)
            RETURNING id, user_id, name, key_hash, key_prefix, permissions, last_used_at,
                      expires_at, created_at, updated_at
            "#,
        )
        .bind(key_hash)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        if rows.len() > 1 {
            return Err(DatabaseError::Integrity(format!(
                "{} API keys share one hash",
                rows.len()
            )));
        }

        let key = rows.first().map(map_api_key);
        if key.is_some() {
            tx.commit().await?;
        }

        Ok(key)
    }
}
