//! Authenticated principal

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::models::Permission;

/// How a request proved its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Session,
    #[serde(rename = "apikey")]
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Session => "session",
            AuthMethod::ApiKey => "apikey",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity a request is attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub method: AuthMethod,
    /// Set for API-key principals
    pub api_key_id: Option<Uuid>,
    /// Key permissions for API-key principals, role permissions for session
    /// principals when sessions are role-scoped, empty otherwise
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn session(user_id: Uuid, permissions: Vec<Permission>) -> Self {
        Self {
            user_id,
            method: AuthMethod::Session,
            api_key_id: None,
            permissions,
        }
    }

    pub fn api_key(user_id: Uuid, api_key_id: Uuid, permissions: Vec<Permission>) -> Self {
        Self {
            user_id,
            method: AuthMethod::ApiKey,
            api_key_id: Some(api_key_id),
            permissions,
        }
    }
}
