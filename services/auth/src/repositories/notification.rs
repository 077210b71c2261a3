//! Notification repository

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use uuid::Uuid;

use super::NotificationStore;
use crate::models::{NewNotification, Notification, NotificationFilter, Page};

/// PostgreSQL notification repository
#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, filter: NotificationFilter) {
    query.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(unread) = filter.unread {
        query.push(" AND is_read = ").push_bind(!unread);
    }
    if let Some(kind) = filter.kind {
        query.push(" AND type = ").push_bind(kind.as_str());
    }
}

fn map_notification(row: &PgRow) -> DatabaseResult<Notification> {
    let kind: String = row.get("type");
    let severity: String = row.get("severity");

    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: kind.parse().map_err(DatabaseError::Integrity)?,
        severity: severity.parse().map_err(DatabaseError::Integrity)?,
        title: row.get("title"),
        message: row.get("message"),
        metadata: row.get("metadata"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl NotificationStore for PgNotificationRepository {
    async fn insert(&self, notification: &NewNotification) -> DatabaseResult<Notification> {
        let row = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, type, severity, title, message, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, type, severity, title, message, metadata, is_read, created_at
            "#,
        )
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(notification.severity.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.metadata)
        .fetch_one(&self.pool)
        .await?;

        map_notification(&row)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: NotificationFilter,
        page: Page,
    ) -> DatabaseResult<(Vec<Notification>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
        push_filters(&mut count, user_id, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT id, user_id, type, severity, title, message, metadata, is_read, created_at \
             FROM notifications",
        );
        push_filters(&mut query, user_id, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        let notifications = rows
            .iter()
            .map(map_notification)
            .collect::<DatabaseResult<Vec<_>>>()?;

        Ok((notifications, total))
    }

    async fn unread_count(&self, user_id: Uuid) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> DatabaseResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
