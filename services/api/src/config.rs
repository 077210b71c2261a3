//! HTTP server configuration

use auth::scheduler::DEFAULT_PURGE_SCHEDULE;
use std::env;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Cron expression (with seconds) for the expired-session purge
    pub session_purge_schedule: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            session_purge_schedule: DEFAULT_PURGE_SCHEDULE.to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `API_HOST`: interface to bind (default: 0.0.0.0)
    /// - `API_PORT`: port to bind (default: 3001)
    /// - `SESSION_PURGE_SCHEDULE`: cron schedule of the session purge (default: every 15 minutes)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = env::var("API_HOST").unwrap_or(defaults.host);

        let port = env::var("API_PORT")
            .unwrap_or_else(|_| defaults.port.to_string())
            .parse()
            .unwrap_or(defaults.port);

        let session_purge_schedule =
            env::var("SESSION_PURGE_SCHEDULE").unwrap_or(defaults.session_purge_schedule);

        Self {
            host,
            port,
            session_purge_schedule,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        unsafe {
            env::remove_var("API_HOST");
            env::remove_var("API_PORT");
            env::remove_var("SESSION_PURGE_SCHEDULE");
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_without_environment() {
        clear();

        let config = ServerConfig::from_env();
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
        assert_eq!(config.session_purge_schedule, DEFAULT_PURGE_SCHEDULE);
    }

    #[test]
    #[serial]
    fn reads_overrides_and_ignores_bad_ports() {
        clear();
        unsafe {
            env::set_var("API_HOST", "127.0.0.1");
            env::set_var("API_PORT", "not-a-port");
            env::set_var("SESSION_PURGE_SCHEDULE", "0 0 * * * *");
        }

        let config = ServerConfig::from_env();
        assert_eq!(config.bind_address(), "127.0.0.1:3001");
        assert_eq!(config.session_purge_schedule, "0 0 * * * *");

        unsafe {
            env::set_var("API_PORT", "8080");
        }
        assert_eq!(ServerConfig::from_env().port, 8080);

        clear();
    }
}
