//! Activity log repository
//!
//! Rows are append-only. Inserts use READ COMMITTED since they never read.

use async_trait::async_trait;
use common::{
    database::begin_read_committed,
    error::{DatabaseError, DatabaseResult},
};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use tracing::warn;

use super::ActivityStore;
use crate::models::{ActivityChange, ActivityFilter, ActivityLogEntry, NewActivity, Page};

const SELECT_COLUMNS: &str = "SELECT id, entity_type, entity_id, entity_name, action, changes, \
                              user_id, user_name, created_at FROM activity_logs WHERE 1 = 1";

/// PostgreSQL activity repository
#[derive(Clone)]
pub struct PgActivityRepository {
    pool: PgPool,
}

impl PgActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ActivityFilter) {
    if let Some(entity_type) = filter.entity_type {
        query.push(" AND entity_type = ").push_bind(entity_type.as_str());
    }
    if let Some(entity_id) = filter.entity_id {
        query.push(" AND entity_id = ").push_bind(entity_id);
    }
    if let Some(action) = filter.action {
        query.push(" AND action = ").push_bind(action.as_str());
    }
}

fn map_entry(row: &PgRow) -> DatabaseResult<ActivityLogEntry> {
    let entity_type: String = row.get("entity_type");
    let action: String = row.get("action");
    let changes: serde_json::Value = row.get("changes");

    let changes = serde_json::from_value::<Vec<ActivityChange>>(changes).unwrap_or_else(|e| {
        warn!("Unreadable activity changes, returning none: {}", e);
        Vec::new()
    });

    Ok(ActivityLogEntry {
        id: row.get("id"),
        entity_type: entity_type.parse().map_err(DatabaseError::Integrity)?,
        entity_id: row.get("entity_id"),
        entity_name: row.get("entity_name"),
        action: action.parse().map_err(DatabaseError::Integrity)?,
        changes,
        user_id: row.get("user_id"),
        user_name: row.get("user_name"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl ActivityStore for PgActivityRepository {
    async fn insert(&self, activity: &NewActivity) -> DatabaseResult<()> {
        let mut tx = begin_read_committed(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO activity_logs
                (entity_type, entity_id, entity_name, action, changes, user_id, user_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(activity.entity_type.as_str())
        .bind(activity.entity_id)
        .bind(&activity.entity_name)
        .bind(activity.action.as_str())
        .bind(activity.changes_json())
        .bind(activity.actor.as_ref().map(|actor| actor.user_id))
        .bind(activity.actor.as_ref().map(|actor| actor.user_name.clone()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn search(
        &self,
        filter: &ActivityFilter,
        page: Page,
    ) -> DatabaseResult<(Vec<ActivityLogEntry>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM activity_logs WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        let entries = rows.iter().map(map_entry).collect::<DatabaseResult<Vec<_>>>()?;

        Ok((entries, total))
    }

    async fn recent(&self, limit: i64) -> DatabaseResult<Vec<ActivityLogEntry>> {
        let mut query = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        query.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(map_entry).collect()
    }
}
