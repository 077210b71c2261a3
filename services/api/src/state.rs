//! Application state shared across handlers

use auth::{
    AccountService, ActivityRecorder, ApiKeyManager, AuthResolver, NotificationService,
    PermissionEvaluator, RoleService, SessionConfig, SessionManager, TaskWorker,
    memory::InMemoryStore,
    repositories::{
        ActivityStore, ApiKeyStore, NotificationStore, PgActivityRepository, PgApiKeyRepository,
        PgNotificationRepository, PgRoleRepository, PgSessionRepository, PgUserRepository,
        RoleStore, SessionStore, UserStore,
    },
    tasks::{self, TaskHandlers},
};
use common::crypto::Cipher;
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    inventory::InventoryService,
    repositories::{InMemoryInventory, InventoryStore, PgInventoryRepository},
};

/// Storage handles the services are built from
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub activity: Arc<dyn ActivityStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub roles: Arc<dyn RoleStore>,
    pub inventory: Arc<dyn InventoryStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            sessions: Arc::new(PgSessionRepository::new(pool.clone())),
            api_keys: Arc::new(PgApiKeyRepository::new(pool.clone())),
            activity: Arc::new(PgActivityRepository::new(pool.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
            roles: Arc::new(PgRoleRepository::new(pool.clone())),
            inventory: Arc::new(PgInventoryRepository::new(pool)),
        }
    }

    pub fn in_memory(store: Arc<InMemoryStore>, inventory: Arc<InMemoryInventory>) -> Self {
        Self {
            users: store.clone(),
            sessions: store.clone(),
            api_keys: store.clone(),
            activity: store.clone(),
            notifications: store.clone(),
            roles: store,
            inventory,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub sessions: SessionManager,
    pub resolver: AuthResolver,
    pub evaluator: PermissionEvaluator,
    pub api_keys: ApiKeyManager,
    pub activity: ActivityRecorder,
    pub notifications: NotificationService,
    pub roles: RoleService,
    pub inventory: InventoryService,
}

impl AppState {
    /// Wire every service and start the background worker. The worker must be
    /// shut down by the caller once the server stops.
    pub fn build(
        stores: Stores,
        cipher: Cipher,
        session_config: SessionConfig,
        queue_capacity: usize,
    ) -> (Self, TaskWorker) {
        let (queue, worker) = tasks::spawn(
            queue_capacity,
            TaskHandlers {
                activity: stores.activity.clone(),
                users: stores.users.clone(),
                notifications: stores.notifications.clone(),
            },
        );

        let session_mode = session_config.permission_mode;
        let sessions = SessionManager::new(stores.sessions.clone(), session_config);
        let activity = ActivityRecorder::new(stores.activity.clone(), queue.clone());
        let notifications = NotificationService::new(stores.notifications.clone(), queue);

        let state = Self {
            accounts: AccountService::new(stores.users.clone(), sessions.clone(), cipher),
            resolver: AuthResolver::new(
                stores.sessions,
                stores.api_keys.clone(),
                stores.roles.clone(),
                session_mode,
            ),
            evaluator: PermissionEvaluator::new(session_mode),
            api_keys: ApiKeyManager::new(stores.api_keys, PermissionEvaluator::new(session_mode)),
            roles: RoleService::new(stores.roles),
            inventory: InventoryService::new(
                stores.inventory,
                activity.clone(),
                notifications.clone(),
            ),
            sessions,
            activity,
            notifications,
        };

        (state, worker)
    }
}
