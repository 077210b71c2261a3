//! Session repository
//!
//! A user owns at most one session. `replace_for_user` deletes and inserts in
//! one SERIALIZABLE transaction, so two concurrent logins cannot interleave.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{database::begin_serializable, error::DatabaseResult};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::SessionStore;
use crate::models::{NewSession, Session};

/// PostgreSQL session repository
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionRepository {
    async fn find_user_ids_by_token_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Vec<Uuid>> {
        let mut tx = begin_serializable(&self.pool).await?;

        let rows = sqlx::query(
            r#"
            SELECT user_id
            FROM sessions
            WHERE token_hash = $1 AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(rows.iter().map(|row| row.get("user_id")).collect())
    }

    async fn replace_for_user(&self, session: &NewSession) -> DatabaseResult<Session> {
        info!("Replacing sessions for user: {}", session.user_id);

        let mut tx = begin_serializable(&self.pool).await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(session.user_id)
            .execute(&mut *tx)
            .await?;

        let created = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, token_hash, user_agent, ip_address, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, token_hash, user_agent, ip_address, expires_at,
                      created_at, updated_at
            "#,
        )
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(session.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> DatabaseResult<u64> {
        let mut tx = begin_serializable(&self.pool).await?;

        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn count_for_user(&self, user_id: Uuid) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
