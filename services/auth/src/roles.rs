//! Role administration

use common::error::DatabaseError;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    models::{NewRole, NewRoleRecord, Permission, Role, RoleAssignment, UserRole},
    repositories::RoleStore,
    validation::validate_name,
};

#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn RoleStore>,
}

impl RoleService {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AuthResult<Vec<Role>> {
        Ok(self.store.list().await?)
    }

    pub async fn create(&self, role: NewRole) -> AuthResult<Role> {
        validate_name("Role name", &role.name).map_err(AuthError::Validation)?;
        let permissions = Permission::parse_all(&role.permissions)
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        let record = NewRoleRecord {
            name: role.name.trim().to_string(),
            description: role.description,
            permissions,
        };

        let created = self.store.create(&record).await.map_err(|e| match e {
            DatabaseError::UniqueViolation(_) => {
                AuthError::Conflict("Role already exist!".to_string())
            }
            other => AuthError::Storage(other),
        })?;

        info!("Created role {} ({})", created.name, created.id);
        Ok(created)
    }

    pub async fn delete(&self, id: Uuid) -> AuthResult<()> {
        match self.store.delete(id).await? {
            0 => Err(AuthError::NotFound("Role not found".to_string())),
            _ => {
                info!("Deleted role: {}", id);
                Ok(())
            }
        }
    }

    pub async fn assign(&self, assignment: RoleAssignment) -> AuthResult<UserRole> {
        let link = self
            .store
            .assign(assignment.user_id, assignment.role_id)
            .await
            .map_err(|e| match e {
                DatabaseError::MissingReference(what) => {
                    AuthError::NotFound(format!("Unknown {}", what))
                }
                DatabaseError::UniqueViolation(_) => {
                    AuthError::Conflict("Role already assigned to user".to_string())
                }
                other => AuthError::Storage(other),
            })?;

        info!(
            "Assigned role {} to user {}",
            assignment.role_id, assignment.user_id
        );
        Ok(link)
    }

    pub async fn unassign(&self, assignment: RoleAssignment) -> AuthResult<()> {
        match self
            .store
            .unassign(assignment.user_id, assignment.role_id)
            .await?
        {
            0 => Err(AuthError::NotFound(
                "Role is not assigned to user".to_string(),
            )),
            _ => {
                info!(
                    "Unassigned role {} from user {}",
                    assignment.role_id, assignment.user_id
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::InMemoryStore, models::NewUserRecord, repositories::UserStore};

    fn new_role(name: &str, permissions: &[&str]) -> NewRole {
        NewRole {
            name: name.to_string(),
            description: Some("test role".to_string()),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    async fn seed_user(store: &InMemoryStore, role: &str) -> Uuid {
        UserStore::create(
            store,
            &NewUserRecord {
                email: "sealed".to_string(),
                password_hash: "hash".to_string(),
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                organization_id: None,
                user_type: "USER".to_string(),
                role: role.to_string(),
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn create_validates_and_rejects_duplicates() {
        let store = Arc::new(InMemoryStore::new());
        let roles = RoleService::new(store);

        let created = roles
            .create(new_role("operators", &["read:devices", "write:devices"]))
            .await
            .unwrap();
        assert_eq!(
            created.permissions,
            vec![Permission::ReadDevices, Permission::WriteDevices]
        );

        assert!(matches!(
            roles.create(new_role("operators", &[])).await,
            Err(AuthError::Conflict(message)) if message == "Role already exist!"
        ));
        assert!(matches!(
            roles.create(new_role("auditors", &["read:everything"])).await,
            Err(AuthError::Validation(_))
        ));
        assert_eq!(roles.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn assignment_lifecycle() {
        let store = Arc::new(InMemoryStore::new());
        let roles = RoleService::new(store.clone());

        let base = roles.create(new_role("base", &[])).await.unwrap();
        let admin = roles.create(new_role("admin", &["write:roles"])).await.unwrap();
        let user_id = seed_user(&store, "base").await;
        let assignment = RoleAssignment {
            user_id,
            role_id: admin.id,
        };

        roles.assign(assignment).await.unwrap();
        assert!(matches!(
            roles.assign(assignment).await,
            Err(AuthError::Conflict(_))
        ));
        assert_eq!(
            store.permissions_for_user(user_id).await.unwrap(),
            vec![Permission::WriteRoles]
        );

        roles.unassign(assignment).await.unwrap();
        assert!(matches!(
            roles.unassign(assignment).await,
            Err(AuthError::NotFound(_))
        ));

        assert!(matches!(
            roles
                .assign(RoleAssignment {
                    user_id,
                    role_id: Uuid::new_v4(),
                })
                .await,
            Err(AuthError::NotFound(_))
        ));

        roles.delete(base.id).await.unwrap();
        assert!(matches!(
            roles.delete(base.id).await,
            Err(AuthError::NotFound(_))
        ));
    }
}
