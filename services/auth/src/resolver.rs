//! Authentication resolver
//!
//! Turns the credential material of a request into a [`Principal`]. The
//! session cookie is tried first, then an `Authorization: Bearer` API key.

use chrono::Utc;
use common::crypto::hash;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::{
    config::SessionPermissionMode,
    error::{AuthError, AuthResult},
    principal::Principal,
    repositories::{ApiKeyStore, RoleStore, SessionStore},
};

/// Raw credential material taken from a request
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials<'a> {
    /// Value of the `session_token` cookie
    pub session_token: Option<&'a str>,
    /// Value of the `Authorization` header
    pub authorization: Option<&'a str>,
}

/// Extract the secret from `Bearer <secret>`
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, secret) = header.split_once(' ')?;
    if scheme != "Bearer" || secret.is_empty() {
        return None;
    }
    Some(secret)
}

#[derive(Clone)]
pub struct AuthResolver {
    sessions: Arc<dyn SessionStore>,
    api_keys: Arc<dyn ApiKeyStore>,
    roles: Arc<dyn RoleStore>,
    session_mode: SessionPermissionMode,
}

impl AuthResolver {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        api_keys: Arc<dyn ApiKeyStore>,
        roles: Arc<dyn RoleStore>,
        session_mode: SessionPermissionMode,
    ) -> Self {
        Self {
            sessions,
            api_keys,
            roles,
            session_mode,
        }
    }

    /// Resolve a session cookie. Exactly one live session must match.
    pub async fn resolve_session(&self, token: Option<&str>) -> AuthResult<Principal> {
        let token = token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingSessionToken)?;

        let user_ids = self
            .sessions
            .find_user_ids_by_token_hash(&hash(token), Utc::now())
            .await?;

        let user_id = match user_ids.as_slice() {
            [user_id] => *user_id,
            [] => return Err(AuthError::Unauthenticated),
            many => {
                error!("Session token matches {} sessions, refusing it", many.len());
                return Err(AuthError::Unauthenticated);
            }
        };

        let permissions = match self.session_mode {
            SessionPermissionMode::FullAccess => Vec::new(),
            SessionPermissionMode::RoleScoped => self.roles.permissions_for_user(user_id).await?,
        };

        Ok(Principal::session(user_id, permissions))
    }

    /// Resolve a raw API key. The key must exist and be unexpired. Its
    /// last-used time is updated.
    pub async fn resolve_api_key(&self, secret: &str) -> AuthResult<Principal> {
        let key = self
            .api_keys
            .validate_and_touch(&hash(secret), Utc::now())
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        Ok(Principal::api_key(key.user_id, key.id, key.permissions))
    }

    /// Session first, then API key. Fails with `Unauthenticated` when
    /// neither yields a principal.
    pub async fn resolve(&self, credentials: &Credentials<'_>) -> AuthResult<Principal> {
        match self.resolve_session(credentials.session_token).await {
            Ok(principal) => return Ok(principal),
            Err(e) if e.is_internal() => {
                error!(error = %e, "Session lookup failed, trying API key");
            }
            Err(e) => debug!("Session authentication failed: {}", e),
        }

        let Some(secret) = credentials.authorization.and_then(parse_bearer) else {
            return Err(AuthError::Unauthenticated);
        };

        match self.resolve_api_key(secret).await {
            Ok(principal) => Ok(principal),
            Err(e) if e.is_internal() => {
                error!(error = %e, "API key lookup failed");
                Err(AuthError::Unauthenticated)
            }
            Err(e) => {
                warn!("API key authentication failed: {}", e);
                Err(AuthError::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::InMemoryStore,
        models::{ApiKey, NewApiKey, NewRoleRecord, NewSession, Permission, Session},
        principal::AuthMethod,
    };
    use chrono::Duration;
    use common::{crypto::generate_secret, error::DatabaseError};
    use uuid::Uuid;

    fn resolver(store: &Arc<InMemoryStore>, mode: SessionPermissionMode) -> AuthResolver {
        AuthResolver::new(store.clone(), store.clone(), store.clone(), mode)
    }

    async fn session_for(store: &InMemoryStore, user_id: Uuid) -> String {
        let token = generate_secret();
        store
            .replace_for_user(&NewSession {
                user_id,
                token_hash: hash(&token),
                user_agent: None,
                ip_address: None,
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();
        token
    }

    async fn key_for(
        store: &InMemoryStore,
        user_id: Uuid,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> String {
        let secret = format!("sk_live_{}", generate_secret());
        ApiKeyStore::insert(
            store,
            &NewApiKey {
                user_id,
                name: "ci".to_string(),
                key_hash: hash(&secret),
                key_prefix: secret[..16].to_string(),
                permissions: vec![Permission::ReadDevices],
                expires_at,
            },
        )
        .await
        .unwrap();
        secret
    }

    #[test]
    fn bearer_parsing_requires_the_scheme() {
        assert_eq!(parse_bearer("Bearer sk_live_abc"), Some("sk_live_abc"));
        assert_eq!(parse_bearer("bearer sk_live_abc"), None);
        assert_eq!(parse_bearer("Basic dXNlcg=="), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer "), None);
    }

    #[tokio::test]
    async fn session_resolves_to_its_owner() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        let token = session_for(&store, user_id).await;

        let principal = resolver(&store, SessionPermissionMode::FullAccess)
            .resolve_session(Some(&token))
            .await
            .unwrap();
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.method, AuthMethod::Session);
        assert!(principal.api_key_id.is_none());
    }

    #[tokio::test]
    async fn session_without_exactly_one_match_fails_closed() {
        let store = Arc::new(InMemoryStore::new());
        let resolver = resolver(&store, SessionPermissionMode::FullAccess);

        assert!(matches!(
            resolver.resolve_session(None).await,
            Err(AuthError::MissingSessionToken)
        ));
        assert!(matches!(
            resolver.resolve_session(Some("unknown")).await,
            Err(AuthError::Unauthenticated)
        ));

        let token = generate_secret();
        let now = Utc::now();
        for _ in 0..2 {
            store
                .insert_session_unchecked(Session {
                    id: Uuid::new_v4(),
                    user_id: Uuid::new_v4(),
                    token_hash: hash(&token),
                    user_agent: None,
                    ip_address: None,
                    expires_at: now + Duration::hours(1),
                    created_at: now,
                    updated_at: now,
                })
                .unwrap();
        }
        assert!(matches!(
            resolver.resolve_session(Some(&token)).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn expired_sessions_do_not_authenticate() {
        let store = Arc::new(InMemoryStore::new());
        let token = generate_secret();
        let now = Utc::now();
        store
            .insert_session_unchecked(Session {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                token_hash: hash(&token),
                user_agent: None,
                ip_address: None,
                expires_at: now - Duration::seconds(1),
                created_at: now,
                updated_at: now,
            })
            .unwrap();

        assert!(matches!(
            resolver(&store, SessionPermissionMode::FullAccess)
                .resolve_session(Some(&token))
                .await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn dual_check_falls_back_to_the_api_key() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        let secret = key_for(&store, user_id, None).await;
        let header = format!("Bearer {}", secret);

        let principal = resolver(&store, SessionPermissionMode::FullAccess)
            .resolve(&Credentials {
                session_token: Some("stale-cookie"),
                authorization: Some(&header),
            })
            .await
            .unwrap();

        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.method, AuthMethod::ApiKey);
        assert_eq!(principal.permissions, vec![Permission::ReadDevices]);

        let keys = store.list_for_user(user_id).await.unwrap();
        assert!(keys[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn dual_check_prefers_the_session() {
        let store = Arc::new(InMemoryStore::new());
        let session_user = Uuid::new_v4();
        let token = session_for(&store, session_user).await;
        let secret = key_for(&store, Uuid::new_v4(), None).await;
        let header = format!("Bearer {}", secret);

        let principal = resolver(&store, SessionPermissionMode::FullAccess)
            .resolve(&Credentials {
                session_token: Some(&token),
                authorization: Some(&header),
            })
            .await
            .unwrap();
        assert_eq!(principal.user_id, session_user);
        assert_eq!(principal.method, AuthMethod::Session);
    }

    #[tokio::test]
    async fn keys_sharing_a_hash_fail_closed() {
        let store = Arc::new(InMemoryStore::new());
        let secret = generate_secret();
        let now = Utc::now();
        for _ in 0..2 {
            store
                .insert_api_key_unchecked(ApiKey {
                    id: Uuid::new_v4(),
                    user_id: Uuid::new_v4(),
                    name: "twin".to_string(),
                    key_hash: hash(&secret),
                    key_prefix: "sk_live_twin0000".to_string(),
                    permissions: Permission::ALL.to_vec(),
                    last_used_at: None,
                    expires_at: None,
                    created_at: now,
                    updated_at: now,
                })
                .unwrap();
        }
        let resolver = resolver(&store, SessionPermissionMode::FullAccess);

        assert!(matches!(
            resolver.resolve_api_key(&secret).await,
            Err(AuthError::Storage(DatabaseError::Integrity(_)))
        ));

        let header = format!("Bearer {}", secret);
        assert!(matches!(
            resolver
                .resolve(&Credentials {
                    session_token: None,
                    authorization: Some(&header),
                })
                .await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn expired_or_unknown_keys_are_unauthenticated() {
        let store = Arc::new(InMemoryStore::new());
        let secret = key_for(&store, Uuid::new_v4(), Some(Utc::now() - Duration::days(1))).await;
        let resolver = resolver(&store, SessionPermissionMode::FullAccess);

        for header in [
            format!("Bearer {}", secret),
            "Bearer sk_live_not-a-key".to_string(),
            secret.clone(),
        ] {
            assert!(matches!(
                resolver
                    .resolve(&Credentials {
                        session_token: None,
                        authorization: Some(&header),
                    })
                    .await,
                Err(AuthError::Unauthenticated)
            ));
        }
        assert!(matches!(
            resolver.resolve(&Credentials::default()).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn role_scoped_sessions_carry_role_permissions() {
        let store = Arc::new(InMemoryStore::new());
        let role = RoleStore::create(
            store.as_ref(),
            &NewRoleRecord {
                name: "viewer".to_string(),
                description: None,
                permissions: vec![Permission::ReadVms, Permission::ReadDevices],
            },
        )
        .await
        .unwrap();

        let user = crate::repositories::UserStore::create(
            store.as_ref(),
            &crate::models::NewUserRecord {
                email: "sealed".to_string(),
                password_hash: "hash".to_string(),
                first_name: "Vee".to_string(),
                last_name: "Ewer".to_string(),
                organization_id: None,
                user_type: "USER".to_string(),
                role: role.name.clone(),
            },
        )
        .await
        .unwrap();
        let token = session_for(&store, user.id).await;

        let principal = resolver(&store, SessionPermissionMode::RoleScoped)
            .resolve_session(Some(&token))
            .await
            .unwrap();
        assert_eq!(
            principal.permissions,
            vec![Permission::ReadDevices, Permission::ReadVms]
        );
    }
}
