//! Periodic maintenance jobs

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::session::SessionManager;

/// Every fifteen minutes, on the minute
pub const DEFAULT_PURGE_SCHEDULE: &str = "0 */15 * * * *";

/// Start a scheduler that deletes expired sessions on `schedule`.
///
/// The returned scheduler keeps running until it is shut down or dropped
/// with the runtime.
pub async fn start_session_purge(sessions: SessionManager, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let sessions = sessions.clone();
        Box::pin(async move {
            match sessions.cleanup_expired_sessions().await {
                Ok(purged) => info!("Session purge job removed {} sessions", purged),
                Err(e) => error!(error = %e, "Session purge job failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started session purge scheduler with schedule: {}", schedule);
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SessionConfig, memory::InMemoryStore};
    use std::sync::Arc;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemoryStore::new()), SessionConfig::default())
    }

    #[tokio::test]
    async fn rejects_malformed_schedules() {
        assert!(start_session_purge(manager(), "every now and then").await.is_err());
    }

    #[tokio::test]
    async fn starts_and_stops_with_a_valid_schedule() {
        let mut scheduler = start_session_purge(manager(), DEFAULT_PURGE_SCHEDULE)
            .await
            .unwrap();
        scheduler.shutdown().await.unwrap();
    }
}
