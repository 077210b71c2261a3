//! Role repository

use async_trait::async_trait;
use common::{
    database::begin_serializable,
    error::{DatabaseError, DatabaseResult},
};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::RoleStore;
use crate::models::{NewRoleRecord, Permission, Role, UserRole};

/// PostgreSQL role repository
#[derive(Clone)]
pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_role(row: &PgRow) -> Role {
    let permissions: serde_json::Value = row.get("permissions");

    Role {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        permissions: Permission::from_stored(&permissions),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl RoleStore for PgRoleRepository {
    async fn list(&self) -> DatabaseResult<Vec<Role>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, permissions, created_at, updated_at
            FROM roles
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_role).collect())
    }

    async fn create(&self, role: &NewRoleRecord) -> DatabaseResult<Role> {
        info!("Creating role: {}", role.name);

        let mut tx = begin_serializable(&self.pool).await?;

        let existing = sqlx::query("SELECT id FROM roles WHERE name = $1")
            .bind(&role.name)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            return Err(DatabaseError::UniqueViolation("roles_name_key".to_string()));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO roles (name, description, permissions)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, permissions, created_at, updated_at
            "#,
        )
        .bind(&role.name)
        .bind(&role.description)
        .bind(Permission::to_stored(&role.permissions))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(map_role(&row))
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn assign(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<UserRole> {
        info!("Assigning role {} to user: {}", role_id, user_id);

        let mut tx = begin_serializable(&self.pool).await?;

        let role = sqlx::query("SELECT id FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(&mut *tx)
            .await?;
        if role.is_none() {
            return Err(DatabaseError::MissingReference(format!("role {}", role_id)));
        }

        let user = sqlx::query("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if user.is_none() {
            return Err(DatabaseError::MissingReference(format!("user {}", user_id)));
        }

        let link = sqlx::query_as::<_, UserRole>(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_id) DO NOTHING
            RETURNING user_id, role_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(link) = link else {
            return Err(DatabaseError::UniqueViolation("user_roles_pkey".to_string()));
        };

        tx.commit().await?;

        Ok(link)
    }

    async fn unassign(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn permissions_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<Permission>> {
        let rows = sqlx::query(
            r#"
            SELECT r.permissions
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut permissions: Vec<Permission> = rows
            .iter()
            .flat_map(|row| Permission::from_stored(&row.get::<serde_json::Value, _>("permissions")))
            .collect();
        permissions.sort();
        permissions.dedup();

        Ok(permissions)
    }
}
