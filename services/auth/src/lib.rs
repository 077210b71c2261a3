//! Credential core of the inventory API
//!
//! Resolves who is calling (session cookie or API key), decides what they may
//! do, manages API keys and sessions, and records the audit trail and user
//! notifications through a background task queue.
//!
//! Storage is reached only through the traits in [`repositories`], so every
//! service can run on PostgreSQL or on [`memory::InMemoryStore`].

pub mod accounts;
pub mod activity;
pub mod api_keys;
pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod notifications;
pub mod permissions;
pub mod principal;
pub mod repositories;
pub mod resolver;
pub mod roles;
pub mod scheduler;
pub mod session;
pub mod tasks;
pub mod validation;

pub use accounts::AccountService;
pub use activity::ActivityRecorder;
pub use api_keys::ApiKeyManager;
pub use config::{SessionConfig, SessionPermissionMode, ShutdownMode, TaskQueueConfig};
pub use error::{AuthError, AuthResult};
pub use notifications::NotificationService;
pub use permissions::PermissionEvaluator;
pub use principal::{AuthMethod, Principal};
pub use resolver::{AuthResolver, Credentials};
pub use roles::RoleService;
pub use session::{ClientInfo, SessionManager};
pub use tasks::{Task, TaskHandlers, TaskQueue, TaskWorker};
