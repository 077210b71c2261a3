//! User repository for database operations

use async_trait::async_trait;
use common::{
    database::begin_serializable,
    error::{DatabaseError, DatabaseResult},
};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::UserStore;
use crate::models::{NewUserRecord, User};

/// PostgreSQL user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn create(&self, record: &NewUserRecord) -> DatabaseResult<User> {
        info!("Creating new user with role: {}", record.role);

        let mut tx = begin_serializable(&self.pool).await?;

        let existing = sqlx::query("SELECT id FROM users WHERE email = $1")
            .bind(&record.email)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            return Err(DatabaseError::UniqueViolation("users_email_key".to_string()));
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, organization_id, user_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, password_hash, first_name, last_name, organization_id,
                      user_type, is_active, is_verified, created_at, updated_at
            "#,
        )
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(record.organization_id)
        .bind(&record.user_type)
        .fetch_one(&mut *tx)
        .await?;

        let role = sqlx::query("SELECT id FROM roles WHERE name = $1")
            .bind(&record.role)
            .fetch_optional(&mut *tx)
            .await?;

        let role_id: Uuid = match role {
            Some(row) => row.get("id"),
            None => return Err(DatabaseError::MissingReference(format!("role {}", record.role))),
        };

        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
            .bind(user.id)
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(user)
    }

    async fn find_by_email(&self, sealed_email: &str) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, organization_id,
                   user_type, is_active, is_verified, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(sealed_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        info!("Finding user by ID: {}", id);

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, organization_id,
                   user_type, is_active, is_verified, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_ids(&self) -> DatabaseResult<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM users")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}
