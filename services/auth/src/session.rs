//! Session management
//!
//! A session is an opaque random token held in the `session_token` cookie.
//! Only its SHA-256 is stored. Issuing or refreshing a session replaces every
//! other session of the user.

use chrono::Utc;
use common::crypto::{generate_secret, hash};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::SessionConfig,
    error::{AuthError, AuthResult},
    models::{IssuedSession, NewSession},
    repositories::SessionStore,
};

/// Client details recorded with a session
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Session manager for handling user sessions
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a new session for a user, dropping any previous one
    pub async fn create_session(
        &self,
        user_id: Uuid,
        client: &ClientInfo,
    ) -> AuthResult<IssuedSession> {
        info!("Creating session for user: {}", user_id);
        self.issue(user_id, client).await
    }

    /// Rotate the session token of a signed-in user
    pub async fn refresh_session(
        &self,
        user_id: Uuid,
        client: &ClientInfo,
    ) -> AuthResult<IssuedSession> {
        info!("Refreshing session for user: {}", user_id);
        self.issue(user_id, client).await
    }

    /// Delete the session behind a cookie token
    pub async fn delete_session(&self, token: &str) -> AuthResult<()> {
        let deleted = self.store.delete_by_token_hash(&hash(token)).await?;
        if deleted == 0 {
            return Err(AuthError::NotFound("Session doesn't exist".to_string()));
        }

        Ok(())
    }

    /// Number of sessions the user currently holds
    pub async fn session_count(&self, user_id: Uuid) -> AuthResult<i64> {
        Ok(self.store.count_for_user(user_id).await?)
    }

    /// Cleanup expired sessions
    pub async fn cleanup_expired_sessions(&self) -> AuthResult<u64> {
        let purged = self.store.purge_expired(Utc::now()).await?;
        if purged > 0 {
            info!("Purged {} expired sessions", purged);
        }
        Ok(purged)
    }

    async fn issue(&self, user_id: Uuid, client: &ClientInfo) -> AuthResult<IssuedSession> {
        let token = generate_secret();
        let now = Utc::now();

        self.store
            .replace_for_user(&NewSession {
                user_id,
                token_hash: hash(&token),
                user_agent: client.user_agent.clone(),
                ip_address: client.ip_address.clone(),
                expires_at: now + self.config.ttl(),
            })
            .await?;

        Ok(IssuedSession {
            user_id,
            token,
            cookie_expires_at: now + self.config.cookie_ttl(),
        })
    }
}
