//! In-memory implementation of every storage trait.
//!
//! Intended for tests and embedded use. Each call holds the store lock for its
//! whole duration, which gives the same all-or-nothing behavior as the
//! PostgreSQL transactions. Faults can be injected into the detached write
//! paths to exercise their error handling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use std::{
    collections::HashMap,
    sync::{
        RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, Ordering},
    },
};
use uuid::Uuid;

use crate::{
    models::{
        ActivityFilter, ActivityLogEntry, ApiKey, NewActivity, NewApiKey, NewNotification,
        NewRoleRecord, NewSession, NewUserRecord, Notification, NotificationFilter, Page,
        Permission, Role, Session, User, UserRole,
    },
    repositories::{
        ActivityStore, ApiKeyStore, NotificationStore, RoleStore, SessionStore, UserStore,
    },
};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    user_roles: Vec<UserRole>,
    sessions: Vec<Session>,
    api_keys: Vec<ApiKey>,
    activity: Vec<ActivityLogEntry>,
    notifications: Vec<Notification>,
}

#[derive(Debug, Default)]
struct Faults {
    activity_writes: AtomicBool,
    user_listing: AtomicBool,
    notification_writes: AtomicBool,
    user_lookups: AtomicBool,
}

/// Map-backed store for tests and embedded use
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    faults: Faults,
}

fn injected_fault() -> DatabaseError {
    DatabaseError::Query(sqlx::Error::PoolTimedOut)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every activity insert fail
    pub fn fail_activity_writes(&self, fail: bool) {
        self.faults.activity_writes.store(fail, Ordering::SeqCst);
    }

    /// Make user enumeration fail
    pub fn fail_user_listing(&self, fail: bool) {
        self.faults.user_listing.store(fail, Ordering::SeqCst);
    }

    /// Make every notification insert fail
    pub fn fail_notification_writes(&self, fail: bool) {
        self.faults.notification_writes.store(fail, Ordering::SeqCst);
    }

    /// Make user lookups by id never complete
    pub fn stall_user_lookups(&self, stall: bool) {
        self.faults.user_lookups.store(stall, Ordering::SeqCst);
    }

    /// Insert a session row without the single-session replacement. Lets tests
    /// reproduce corrupt tables.
    pub fn insert_session_unchecked(&self, session: Session) -> DatabaseResult<()> {
        self.write()?.sessions.push(session);
        Ok(())
    }

    /// Insert an API key row without the unique hash check
    pub fn insert_api_key_unchecked(&self, key: ApiKey) -> DatabaseResult<()> {
        self.write()?.api_keys.push(key);
        Ok(())
    }

    /// Number of activity rows written so far
    pub fn activity_len(&self) -> DatabaseResult<usize> {
        Ok(self.read()?.activity.len())
    }

    fn read(&self) -> DatabaseResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| DatabaseError::Integrity("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> DatabaseResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| DatabaseError::Integrity("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create(&self, record: &NewUserRecord) -> DatabaseResult<User> {
        let mut state = self.write()?;

        if state.users.values().any(|user| user.email == record.email) {
            return Err(DatabaseError::UniqueViolation("users_email_key".to_string()));
        }

        let role_id = state
            .roles
            .values()
            .find(|role| role.name == record.role)
            .map(|role| role.id)
            .ok_or_else(|| DatabaseError::MissingReference(format!("role {}", record.role)))?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: record.email.clone(),
            password_hash: record.password_hash.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            organization_id: record.organization_id,
            user_type: record.user_type.clone(),
            is_active: true,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };

        state.users.insert(user.id, user.clone());
        state.user_roles.push(UserRole {
            user_id: user.id,
            role_id,
            created_at: now,
        });

        Ok(user)
    }

    async fn find_by_email(&self, sealed_email: &str) -> DatabaseResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|user| user.email == sealed_email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        if self.faults.user_lookups.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn list_ids(&self) -> DatabaseResult<Vec<Uuid>> {
        if self.faults.user_listing.load(Ordering::SeqCst) {
            return Err(injected_fault());
        }
        Ok(self.read()?.users.keys().copied().collect())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn find_user_ids_by_token_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Vec<Uuid>> {
        Ok(self
            .read()?
            .sessions
            .iter()
            .filter(|session| session.token_hash == token_hash && session.expires_at > now)
            .map(|session| session.user_id)
            .collect())
    }

    async fn replace_for_user(&self, session: &NewSession) -> DatabaseResult<Session> {
        let mut state = self.write()?;

        state
            .sessions
            .retain(|existing| existing.user_id != session.user_id);

        let now = Utc::now();
        let created = Session {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            token_hash: session.token_hash.clone(),
            user_agent: session.user_agent.clone(),
            ip_address: session.ip_address.clone(),
            expires_at: session.expires_at,
            created_at: now,
            updated_at: now,
        };
        state.sessions.push(created.clone());

        Ok(created)
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> DatabaseResult<u64> {
        let mut state = self.write()?;
        let before = state.sessions.len();
        state
            .sessions
            .retain(|session| session.token_hash != token_hash);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn count_for_user(&self, user_id: Uuid) -> DatabaseResult<i64> {
        Ok(self
            .read()?
            .sessions
            .iter()
            .filter(|session| session.user_id == user_id)
            .count() as i64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> DatabaseResult<u64> {
        let mut state = self.write()?;
        let before = state.sessions.len();
        state.sessions.retain(|session| session.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryStore {
    async fn insert(&self, key: &NewApiKey) -> DatabaseResult<ApiKey> {
        let mut state = self.write()?;

        if state.api_keys.iter().any(|existing| existing.key_hash == key.key_hash) {
            return Err(DatabaseError::UniqueViolation("api_keys_key_hash_key".to_string()));
        }

        let now = Utc::now();
        let created = ApiKey {
            id: Uuid::new_v4(),
            user_id: key.user_id,
            name: key.name.clone(),
            key_hash: key.key_hash.clone(),
            key_prefix: key.key_prefix.clone(),
            permissions: key.permissions.clone(),
            last_used_at: None,
            expires_at: key.expires_at,
            created_at: now,
            updated_at: now,
        };
        state.api_keys.push(created.clone());

        Ok(created)
    }

    async fn list_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<ApiKey>> {
        Ok(self
            .read()?
            .api_keys
            .iter()
            .rev()
            .filter(|key| key.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> DatabaseResult<u64> {
        let mut state = self.write()?;
        let before = state.api_keys.len();
        state
            .api_keys
            .retain(|key| !(key.id == id && key.user_id == user_id));
        Ok((before - state.api_keys.len()) as u64)
    }

    async fn validate_and_touch(
        &self,
        key_hash: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Option<ApiKey>> {
        let mut state = self.write()?;

        let mut matches = state
            .api_keys
            .iter_mut()
            .filter(|key| key.key_hash == key_hash && !key.is_expired_at(now));

        let Some(key) = matches.next() else {
            return Ok(None);
        };
        if matches.next().is_some() {
            return Err(DatabaseError::Integrity(
                "multiple API keys share one hash".to_string(),
            ));
        }

        key.last_used_at = Some(now);
        Ok(Some(key.clone()))
    }
}

#[async_trait]
impl ActivityStore for InMemoryStore {
    async fn insert(&self, activity: &NewActivity) -> DatabaseResult<()> {
        if self.faults.activity_writes.load(Ordering::SeqCst) {
            return Err(injected_fault());
        }

        let changes = serde_json::from_value(activity.changes_json()).unwrap_or_default();
        let entry = ActivityLogEntry {
            id: Uuid::new_v4(),
            entity_type: activity.entity_type,
            entity_id: activity.entity_id,
            entity_name: activity.entity_name.clone(),
            action: activity.action,
            changes,
            user_id: activity.actor.as_ref().map(|actor| actor.user_id),
            user_name: activity.actor.as_ref().map(|actor| actor.user_name.clone()),
            created_at: Utc::now(),
        };

        self.write()?.activity.push(entry);
        Ok(())
    }

    async fn search(
        &self,
        filter: &ActivityFilter,
        page: Page,
    ) -> DatabaseResult<(Vec<ActivityLogEntry>, i64)> {
        let state = self.read()?;
        let matching: Vec<&ActivityLogEntry> = state
            .activity
            .iter()
            .rev()
            .filter(|entry| filter.matches(entry))
            .collect();

        let total = matching.len() as i64;
        let entries = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok((entries, total))
    }

    async fn recent(&self, limit: i64) -> DatabaseResult<Vec<ActivityLogEntry>> {
        Ok(self
            .read()?
            .activity
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert(&self, notification: &NewNotification) -> DatabaseResult<Notification> {
        if self.faults.notification_writes.load(Ordering::SeqCst) {
            return Err(injected_fault());
        }

        let created = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            kind: notification.kind,
            severity: notification.severity,
            title: notification.title.clone(),
            message: notification.message.clone(),
            metadata: notification.metadata.clone(),
            is_read: false,
            created_at: Utc::now(),
        };

        self.write()?.notifications.push(created.clone());
        Ok(created)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: NotificationFilter,
        page: Page,
    ) -> DatabaseResult<(Vec<Notification>, i64)> {
        let state = self.read()?;
        let matching: Vec<&Notification> = state
            .notifications
            .iter()
            .rev()
            .filter(|notification| notification.user_id == user_id && filter.matches(notification))
            .collect();

        let total = matching.len() as i64;
        let notifications = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok((notifications, total))
    }

    async fn unread_count(&self, user_id: Uuid) -> DatabaseResult<i64> {
        Ok(self
            .read()?
            .notifications
            .iter()
            .filter(|notification| notification.user_id == user_id && !notification.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> DatabaseResult<u64> {
        let mut state = self.write()?;
        let mut updated = 0;
        for notification in state
            .notifications
            .iter_mut()
            .filter(|notification| notification.id == id && notification.user_id == user_id)
        {
            notification.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> DatabaseResult<u64> {
        let mut state = self.write()?;
        let mut updated = 0;
        for notification in state
            .notifications
            .iter_mut()
            .filter(|notification| notification.user_id == user_id && !notification.is_read)
        {
            notification.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> DatabaseResult<u64> {
        let mut state = self.write()?;
        let before = state.notifications.len();
        state
            .notifications
            .retain(|notification| !(notification.id == id && notification.user_id == user_id));
        Ok((before - state.notifications.len()) as u64)
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn list(&self) -> DatabaseResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.read()?.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create(&self, role: &NewRoleRecord) -> DatabaseResult<Role> {
        let mut state = self.write()?;

        if state.roles.values().any(|existing| existing.name == role.name) {
            return Err(DatabaseError::UniqueViolation("roles_name_key".to_string()));
        }

        let now = Utc::now();
        let created = Role {
            id: Uuid::new_v4(),
            name: role.name.clone(),
            description: role.description.clone(),
            permissions: role.permissions.clone(),
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(created.id, created.clone());

        Ok(created)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<u64> {
        let mut state = self.write()?;
        if state.roles.remove(&id).is_none() {
            return Ok(0);
        }
        state.user_roles.retain(|link| link.role_id != id);
        Ok(1)
    }

    async fn assign(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<UserRole> {
        let mut state = self.write()?;

        if !state.roles.contains_key(&role_id) {
            return Err(DatabaseError::MissingReference(format!("role {}", role_id)));
        }
        if !state.users.contains_key(&user_id) {
            return Err(DatabaseError::MissingReference(format!("user {}", user_id)));
        }
        if state
            .user_roles
            .iter()
            .any(|link| link.user_id == user_id && link.role_id == role_id)
        {
            return Err(DatabaseError::UniqueViolation("user_roles_pkey".to_string()));
        }

        let link = UserRole {
            user_id,
            role_id,
            created_at: Utc::now(),
        };
        state.user_roles.push(link.clone());

        Ok(link)
    }

    async fn unassign(&self, user_id: Uuid, role_id: Uuid) -> DatabaseResult<u64> {
        let mut state = self.write()?;
        let before = state.user_roles.len();
        state
            .user_roles
            .retain(|link| !(link.user_id == user_id && link.role_id == role_id));
        Ok((before - state.user_roles.len()) as u64)
    }

    async fn permissions_for_user(&self, user_id: Uuid) -> DatabaseResult<Vec<Permission>> {
        let state = self.read()?;
        let mut permissions: Vec<Permission> = state
            .user_roles
            .iter()
            .filter(|link| link.user_id == user_id)
            .filter_map(|link| state.roles.get(&link.role_id))
            .flat_map(|role| role.permissions.iter().copied())
            .collect();
        permissions.sort();
        permissions.dedup();
        Ok(permissions)
    }
}
