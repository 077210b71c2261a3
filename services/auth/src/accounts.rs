//! Account registration, password login and profile lookup

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use common::{crypto::Cipher, error::DatabaseError};
use std::sync::Arc;
use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    models::{IssuedSession, LoginCredentials, NewUser, NewUserRecord, UserProfile},
    repositories::UserStore,
    session::{ClientInfo, SessionManager},
    validation::{validate_email, validate_name, validate_password},
};

const DEFAULT_USER_TYPE: &str = "USER";

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    sessions: SessionManager,
    cipher: Cipher,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, sessions: SessionManager, cipher: Cipher) -> Self {
        Self {
            users,
            sessions,
            cipher,
        }
    }

    /// Register a user with a role, both in one transaction
    pub async fn register(&self, new_user: NewUser) -> AuthResult<UserProfile> {
        let email = new_user.email.trim().to_lowercase();
        validate_email(&email).map_err(AuthError::Validation)?;
        validate_password(&new_user.password).map_err(AuthError::Validation)?;
        validate_name("First name", &new_user.first_name).map_err(AuthError::Validation)?;
        validate_name("Last name", &new_user.last_name).map_err(AuthError::Validation)?;
        validate_name("Role", &new_user.role).map_err(AuthError::Validation)?;

        let sealed_email = self.cipher.encrypt(&email)?;
        let password_hash = hash_password(new_user.password).await?;

        let record = NewUserRecord {
            email: sealed_email,
            password_hash,
            first_name: new_user.first_name.trim().to_string(),
            last_name: new_user.last_name.trim().to_string(),
            organization_id: new_user.organization_id,
            user_type: new_user
                .user_type
                .unwrap_or_else(|| DEFAULT_USER_TYPE.to_string()),
            role: new_user.role.trim().to_string(),
        };

        let user = self.users.create(&record).await.map_err(|e| match e {
            DatabaseError::UniqueViolation(_) => {
                AuthError::Conflict("User already exists!".to_string())
            }
            DatabaseError::MissingReference(_) => {
                AuthError::Validation("Role doesn't exist".to_string())
            }
            other => AuthError::Storage(other),
        })?;

        info!("Registered user: {}", user.id);
        Ok(UserProfile::from_user(user, email))
    }

    /// Check a password and open a session. Unknown emails, wrong passwords
    /// and disabled accounts are indistinguishable to the caller.
    pub async fn login(
        &self,
        credentials: LoginCredentials,
        client: &ClientInfo,
    ) -> AuthResult<IssuedSession> {
        let email = credentials.email.trim().to_lowercase();
        let sealed_email = self.cipher.encrypt(&email)?;

        let Some(user) = self.users.find_by_email(&sealed_email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(credentials.password, user.password_hash.clone()).await? {
            warn!("Failed password login for user: {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            warn!("Login attempt on inactive user: {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        self.sessions.create_session(user.id, client).await
    }

    /// Profile of the signed-in user with the email opened
    pub async fn me(&self, user_id: Uuid) -> AuthResult<UserProfile> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        let email = self.cipher.decrypt(&user.email)?;
        Ok(UserProfile::from_user(user, email))
    }
}

async fn hash_password(password: String) -> AuthResult<String> {
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))
    })
    .await
    .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {}", e)))?
}

async fn verify_password(password: String, password_hash: String) -> AuthResult<bool> {
    task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash format: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    })
    .await
    .map_err(|e| AuthError::Internal(format!("Password verification task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SessionConfig,
        memory::InMemoryStore,
        models::{NewRoleRecord, Permission},
        repositories::{RoleStore, SessionStore},
    };
    use chrono::Utc;
    use common::crypto::hash;

    async fn setup() -> (Arc<InMemoryStore>, AccountService) {
        let store = Arc::new(InMemoryStore::new());
        RoleStore::create(
            store.as_ref(),
            &NewRoleRecord {
                name: "operator".to_string(),
                description: None,
                permissions: vec![Permission::ReadDevices],
            },
        )
        .await
        .unwrap();

        let cipher = Cipher::from_key_bytes(&[3u8; 32]).unwrap();
        let sessions = SessionManager::new(store.clone(), SessionConfig::default());
        (store.clone(), AccountService::new(store, sessions, cipher))
    }

    fn new_user(email: &str, role: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password: "correct-horse-9".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            organization_id: None,
            user_type: None,
            role: role.to_string(),
        }
    }

    fn login(email: &str, password: &str) -> LoginCredentials {
        LoginCredentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn registered_email_is_stored_sealed() {
        let (store, accounts) = setup().await;

        let profile = accounts.register(new_user("a@b.com", "operator")).await.unwrap();
        assert_eq!(profile.email, "a@b.com");
        assert_eq!(profile.user_type, "USER");

        let stored = store.find_by_id(profile.id).await.unwrap().unwrap();
        assert_ne!(stored.email, "a@b.com");
        assert!(stored.password_hash.starts_with("$argon2"));

        assert_eq!(accounts.me(profile.id).await.unwrap().email, "a@b.com");
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (_, accounts) = setup().await;
        accounts.register(new_user("a@b.com", "operator")).await.unwrap();

        assert!(matches!(
            accounts.register(new_user("A@B.com", "operator")).await,
            Err(AuthError::Conflict(message)) if message == "User already exists!"
        ));
    }

    #[tokio::test]
    async fn unknown_role_is_a_validation_error() {
        let (_, accounts) = setup().await;

        assert!(matches!(
            accounts.register(new_user("a@b.com", "wizard")).await,
            Err(AuthError::Validation(message)) if message == "Role doesn't exist"
        ));
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_before_storage() {
        let (store, accounts) = setup().await;

        assert!(matches!(
            accounts.register(new_user("not-an-email", "operator")).await,
            Err(AuthError::Validation(_))
        ));

        let mut weak = new_user("a@b.com", "operator");
        weak.password = "short".to_string();
        assert!(matches!(
            accounts.register(weak).await,
            Err(AuthError::Validation(_))
        ));

        assert!(store.list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_issues_a_single_session() {
        let (store, accounts) = setup().await;
        let profile = accounts.register(new_user("a@b.com", "operator")).await.unwrap();

        let first = accounts
            .login(login("a@b.com", "correct-horse-9"), &ClientInfo::default())
            .await
            .unwrap();
        let second = accounts
            .login(login("a@b.com", "correct-horse-9"), &ClientInfo::default())
            .await
            .unwrap();

        assert_eq!(second.user_id, profile.id);
        assert_eq!(store.count_for_user(profile.id).await.unwrap(), 1);
        assert!(
            store
                .find_user_ids_by_token_hash(&hash(&first.token), Utc::now())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (_, accounts) = setup().await;
        accounts.register(new_user("a@b.com", "operator")).await.unwrap();

        assert!(matches!(
            accounts
                .login(login("a@b.com", "wrong-horse-9"), &ClientInfo::default())
                .await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts
                .login(login("c@d.com", "correct-horse-9"), &ClientInfo::default())
                .await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let (_, accounts) = setup().await;

        assert!(matches!(
            accounts.me(Uuid::new_v4()).await,
            Err(AuthError::NotFound(_))
        ));
    }
}
