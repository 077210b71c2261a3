//! Environment configuration for the credential core

use chrono::Duration;
use std::env;

/// How session principals are authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPermissionMode {
    /// A signed-in user may call every endpoint
    #[default]
    FullAccess,
    /// A signed-in user holds the union of their roles' permissions
    RoleScoped,
}

impl SessionPermissionMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Some(SessionPermissionMode::FullAccess),
            "roles" => Some(SessionPermissionMode::RoleScoped),
            _ => None,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of the stored session row, in hours
    pub ttl_hours: i64,
    /// Lifetime of the browser cookie, in hours
    pub cookie_ttl_hours: i64,
    /// Set the `Secure` cookie attribute
    pub cookie_secure: bool,
    pub permission_mode: SessionPermissionMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 168,
            cookie_ttl_hours: 24,
            cookie_secure: false,
            permission_mode: SessionPermissionMode::FullAccess,
        }
    }
}

impl SessionConfig {
    /// Create a new SessionConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ttl_hours = env::var("SESSION_TTL_HOURS")
            .unwrap_or_else(|_| defaults.ttl_hours.to_string())
            .parse()
            .unwrap_or(defaults.ttl_hours);

        let cookie_ttl_hours = env::var("SESSION_COOKIE_TTL_HOURS")
            .unwrap_or_else(|_| defaults.cookie_ttl_hours.to_string())
            .parse()
            .unwrap_or(defaults.cookie_ttl_hours);

        let cookie_secure = env::var("SESSION_COOKIE_SECURE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let permission_mode = env::var("SESSION_PERMISSION_MODE")
            .ok()
            .and_then(|value| SessionPermissionMode::parse(&value))
            .unwrap_or_default();

        Self {
            ttl_hours,
            cookie_ttl_hours,
            cookie_secure,
            permission_mode,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::hours(self.ttl_hours)
    }

    pub fn cookie_ttl(&self) -> Duration {
        Duration::hours(self.cookie_ttl_hours)
    }
}

/// What happens to queued side effects at shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownMode {
    /// Run everything already queued
    #[default]
    Drain,
    /// Drop everything already queued
    Discard,
}

/// Background task queue configuration
#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    pub capacity: usize,
    pub shutdown_mode: ShutdownMode,
    pub drain_timeout_secs: u64,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            shutdown_mode: ShutdownMode::Drain,
            drain_timeout_secs: 10,
        }
    }
}

impl TaskQueueConfig {
    /// Create a new TaskQueueConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let capacity = env::var("TASK_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|capacity: &usize| *capacity > 0)
            .unwrap_or(defaults.capacity);

        let shutdown_mode = match env::var("TASK_QUEUE_SHUTDOWN")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "discard" => ShutdownMode::Discard,
            _ => ShutdownMode::Drain,
        };

        let drain_timeout_secs = env::var("TASK_QUEUE_DRAIN_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.drain_timeout_secs);

        Self {
            capacity,
            shutdown_mode,
            drain_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        unsafe {
            for key in [
                "SESSION_TTL_HOURS",
                "SESSION_COOKIE_TTL_HOURS",
                "SESSION_COOKIE_SECURE",
                "SESSION_PERMISSION_MODE",
                "TASK_QUEUE_CAPACITY",
                "TASK_QUEUE_SHUTDOWN",
                "TASK_QUEUE_DRAIN_TIMEOUT_SECS",
            ] {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_session_config_defaults() {
        clear();
        let config = SessionConfig::from_env();
        assert_eq!(config.ttl_hours, 168);
        assert_eq!(config.cookie_ttl(), Duration::hours(24));
        assert!(!config.cookie_secure);
        assert_eq!(config.permission_mode, SessionPermissionMode::FullAccess);
    }

    #[test]
    #[serial]
    fn test_session_config_from_env() {
        clear();
        unsafe {
            env::set_var("SESSION_TTL_HOURS", "12");
            env::set_var("SESSION_COOKIE_SECURE", "true");
            env::set_var("SESSION_PERMISSION_MODE", "Roles");
        }

        let config = SessionConfig::from_env();
        assert_eq!(config.ttl(), Duration::hours(12));
        assert!(config.cookie_secure);
        assert_eq!(config.permission_mode, SessionPermissionMode::RoleScoped);
        clear();
    }

    #[test]
    #[serial]
    fn test_task_queue_config_rejects_zero_capacity() {
        clear();
        unsafe {
            env::set_var("TASK_QUEUE_CAPACITY", "0");
            env::set_var("TASK_QUEUE_SHUTDOWN", "DISCARD");
        }

        let config = TaskQueueConfig::from_env();
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.shutdown_mode, ShutdownMode::Discard);
        clear();
    }
}
