//! API key lifecycle: create, list masked, revoke

use chrono::{DateTime, Duration, Utc};
use common::crypto::{generate_secret, hash};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    models::{
        ApiKeySummary, CreateApiKeyRequest, CreatedApiKey, NewApiKey, Permission,
        api_key::{KEY_MARKER, PREFIX_RANDOM_CHARS},
    },
    permissions::PermissionEvaluator,
    principal::Principal,
    repositories::ApiKeyStore,
};

/// Lifetimes a key may be created with, in days
pub const ALLOWED_EXPIRY_DAYS: [i64; 4] = [30, 60, 90, 120];

const MAX_NAME_LEN: usize = 100;

#[derive(Clone)]
pub struct ApiKeyManager {
    store: Arc<dyn ApiKeyStore>,
    evaluator: PermissionEvaluator,
}

impl ApiKeyManager {
    pub fn new(store: Arc<dyn ApiKeyStore>, evaluator: PermissionEvaluator) -> Self {
        Self { store, evaluator }
    }

    /// Create a key owned by `principal`. A key never carries permissions its
    /// creator does not hold. The returned value is the only place the
    /// plaintext key ever appears.
    pub async fn create(
        &self,
        principal: &Principal,
        request: CreateApiKeyRequest,
    ) -> AuthResult<CreatedApiKey> {
        let user_id = principal.user_id;
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AuthError::Validation("Name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AuthError::Validation(format!(
                "Name must be at most {} characters long",
                MAX_NAME_LEN
            )));
        }

        let permissions = resolve_permissions(&request.permissions)?;
        self.evaluator.authorize_delegation(principal, &permissions)?;
        let now = Utc::now();
        let expires_at = resolve_expiry(&request, now)?;

        let (key, key_prefix) = generate_key();

        let stored = self
            .store
            .insert(&NewApiKey {
                user_id,
                name,
                key_hash: hash(&key),
                key_prefix,
                permissions,
                expires_at,
            })
            .await?;

        info!("Created API key {} for user: {}", stored.id, user_id);

        Ok(CreatedApiKey {
            id: stored.id,
            key,
            name: stored.name,
            permissions: stored.permissions,
            expires_at: stored.expires_at,
            created_at: stored.created_at,
        })
    }

    /// Every key of the user, newest first, with the secret masked
    pub async fn list(&self, user_id: Uuid) -> AuthResult<Vec<ApiKeySummary>> {
        let keys = self.store.list_for_user(user_id).await?;
        Ok(keys.into_iter().map(ApiKeySummary::from).collect())
    }

    /// Delete a key owned by `user_id`. A key that does not exist and a key
    /// owned by someone else are both reported as not found.
    pub async fn revoke(&self, user_id: Uuid, key_id: Uuid) -> AuthResult<()> {
        match self.store.delete_owned(key_id, user_id).await? {
            0 => Err(AuthError::NotFound("API key not found".to_string())),
            _ => {
                info!("Revoked API key {} for user: {}", key_id, user_id);
                Ok(())
            }
        }
    }
}

/// Build a fresh key and its display prefix.
///
/// The key is `sk_live_` followed by 43 base64url characters. The prefix is
/// the marker plus the first eight random characters.
fn generate_key() -> (String, String) {
    let random = generate_secret();
    let key = format!("{}{}", KEY_MARKER, random);
    let prefix = key[..KEY_MARKER.len() + PREFIX_RANDOM_CHARS].to_string();
    (key, prefix)
}

/// Apply the default set when nothing was requested, reject unknown values and
/// make sure the key can manage keys. Order is preserved and duplicates dropped.
pub fn resolve_permissions(requested: &[String]) -> AuthResult<Vec<Permission>> {
    let mut permissions = if requested.is_empty() {
        Permission::DEFAULT_API_KEY.to_vec()
    } else {
        Permission::parse_all(requested)
            .map_err(|_| AuthError::Validation("Invalid permissions provided".to_string()))?
    };

    permissions.push(Permission::ManageApiKeys);

    let mut unique = Vec::with_capacity(permissions.len());
    for permission in permissions {
        if !unique.contains(&permission) {
            unique.push(permission);
        }
    }

    Ok(unique)
}

fn resolve_expiry(
    request: &CreateApiKeyRequest,
    now: DateTime<Utc>,
) -> AuthResult<Option<DateTime<Utc>>> {
    if let Some(days) = request.expires_in_days {
        if !ALLOWED_EXPIRY_DAYS.contains(&days) {
            return Err(AuthError::Validation(format!(
                "expiresInDays must be one of {:?}",
                ALLOWED_EXPIRY_DAYS
            )));
        }
        return Ok(Some(now + Duration::days(days)));
    }

    match request.expires_at {
        Some(expires_at) if expires_at <= now => Err(AuthError::Validation(
            "expiresAt must be in the future".to_string(),
        )),
        other => Ok(other),
    }
}
