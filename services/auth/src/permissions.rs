//! Permission evaluator
//!
//! Requirements use any-of semantics: holding one of the listed permissions
//! is enough.

use tracing::debug;

use crate::{
    config::SessionPermissionMode,
    error::{AuthError, AuthResult},
    models::Permission,
    principal::{AuthMethod, Principal},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionEvaluator {
    session_mode: SessionPermissionMode,
}

impl PermissionEvaluator {
    pub fn new(session_mode: SessionPermissionMode) -> Self {
        Self { session_mode }
    }

    /// Decide whether `principal` may perform an operation requiring any of
    /// `required`. A missing principal is unauthenticated.
    pub fn authorize(&self, principal: Option<&Principal>, required: &[Permission]) -> AuthResult<()> {
        let principal = principal.ok_or(AuthError::Unauthenticated)?;

        let allowed = match (principal.method, self.session_mode) {
            (AuthMethod::Session, SessionPermissionMode::FullAccess) => true,
            (AuthMethod::Session, SessionPermissionMode::RoleScoped) | (AuthMethod::ApiKey, _) => {
                grants_any(&principal.permissions, required)
            }
        };

        if allowed {
            Ok(())
        } else {
            debug!(
                user_id = %principal.user_id,
                method = %principal.method,
                "Denied request lacking any of {:?}",
                required
            );
            Err(AuthError::Forbidden {
                required: required.to_vec(),
            })
        }
    }

    /// Check that `principal` may hand every permission in `requested` on to
    /// a new API key. Key management is always delegable. Anything else must
    /// already be held, unless sessions have full access.
    pub fn authorize_delegation(
        &self,
        principal: &Principal,
        requested: &[Permission],
    ) -> AuthResult<()> {
        if principal.method == AuthMethod::Session
            && self.session_mode == SessionPermissionMode::FullAccess
        {
            return Ok(());
        }

        let missing: Vec<Permission> = requested
            .iter()
            .copied()
            .filter(|permission| {
                *permission != Permission::ManageApiKeys
                    && !principal.permissions.contains(permission)
            })
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        debug!(
            user_id = %principal.user_id,
            method = %principal.method,
            "Denied delegation of {:?}",
            missing
        );
        Err(AuthError::Forbidden { required: missing })
    }
}

fn grants_any(granted: &[Permission], required: &[Permission]) -> bool {
    required.iter().any(|permission| granted.contains(permission))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn key(permissions: &[Permission]) -> Principal {
        Principal::api_key(Uuid::new_v4(), Uuid::new_v4(), permissions.to_vec())
    }

    #[test]
    fn sessions_pass_every_requirement_in_full_access_mode() {
        let evaluator = PermissionEvaluator::default();
        let session = Principal::session(Uuid::new_v4(), vec![]);

        for permission in Permission::ALL {
            assert!(evaluator.authorize(Some(&session), &[permission]).is_ok());
        }
        assert!(evaluator.authorize(Some(&session), &Permission::ALL).is_ok());
    }

    #[test]
    fn api_keys_pass_iff_sets_intersect() {
        let evaluator = PermissionEvaluator::default();

        for granted in Permission::ALL {
            for required in Permission::ALL {
                let principal = key(&[granted, Permission::ManageApiKeys]);
                let result = evaluator.authorize(Some(&principal), &[required]);
                let expected = required == granted || required == Permission::ManageApiKeys;
                assert_eq!(result.is_ok(), expected, "{} vs {}", granted, required);
            }
        }

        let principal = key(&[Permission::ReadDevices]);
        assert!(
            evaluator
                .authorize(
                    Some(&principal),
                    &[Permission::WriteDevices, Permission::ReadDevices]
                )
                .is_ok()
        );
    }

    #[test]
    fn denial_discloses_the_requirement() {
        let evaluator = PermissionEvaluator::default();
        let principal = key(&Permission::DEFAULT_API_KEY);

        match evaluator.authorize(Some(&principal), &[Permission::WriteDevices]) {
            Err(AuthError::Forbidden { required }) => {
                assert_eq!(required, vec![Permission::WriteDevices])
            }
            other => panic!("expected forbidden, got {:?}", other),
        }
    }

    #[test]
    fn missing_principal_is_unauthenticated() {
        let evaluator = PermissionEvaluator::default();
        assert!(matches!(
            evaluator.authorize(None, &[Permission::Search]),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn role_scoped_sessions_use_role_permissions() {
        let evaluator = PermissionEvaluator::new(SessionPermissionMode::RoleScoped);
        let viewer = Principal::session(Uuid::new_v4(), vec![Permission::ReadDevices]);

        assert!(evaluator.authorize(Some(&viewer), &[Permission::ReadDevices]).is_ok());
        assert!(matches!(
            evaluator.authorize(Some(&viewer), &[Permission::DeleteDevices]),
            Err(AuthError::Forbidden { .. })
        ));
    }

    #[test]
    fn full_access_sessions_delegate_anything() {
        let evaluator = PermissionEvaluator::default();
        let session = Principal::session(Uuid::new_v4(), vec![]);

        assert!(evaluator.authorize_delegation(&session, &Permission::ALL).is_ok());
    }

    #[test]
    fn role_scoped_sessions_delegate_only_what_their_roles_grant() {
        let evaluator = PermissionEvaluator::new(SessionPermissionMode::RoleScoped);
        let operator = Principal::session(Uuid::new_v4(), vec![Permission::ReadDevices]);

        assert!(
            evaluator
                .authorize_delegation(
                    &operator,
                    &[Permission::ReadDevices, Permission::ManageApiKeys]
                )
                .is_ok()
        );

        match evaluator.authorize_delegation(
            &operator,
            &[Permission::ReadDevices, Permission::WriteRoles, Permission::ManageApiKeys],
        ) {
            Err(AuthError::Forbidden { required }) => {
                assert_eq!(required, vec![Permission::WriteRoles])
            }
            other => panic!("expected forbidden, got {:?}", other),
        }
    }
}
