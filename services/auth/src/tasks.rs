//! Background side effects
//!
//! Audit writes and notification fan-out run on one dedicated worker fed by a
//! bounded channel. Submitting never waits: when the queue is full the task is
//! dropped and a warning is logged, so a slow database cannot stall requests.
//! At shutdown the worker either drains what is queued or discards it.

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot,
    },
    task::JoinHandle,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::ShutdownMode,
    models::{Actor, NewActivity, NotificationDraft},
    notifications::deliver_to_all,
    repositories::{ActivityStore, NotificationStore, UserStore},
};

/// Work the background worker knows how to run
#[derive(Debug, Clone)]
pub enum Task {
    RecordActivity(NewActivity),
    /// Activity performed by a user whose display name is looked up by the
    /// worker
    RecordUserActivity {
        user_id: Uuid,
        activity: NewActivity,
    },
    NotifyAllUsers(NotificationDraft),
}

impl Task {
    fn kind(&self) -> &'static str {
        match self {
            Task::RecordActivity(_) => "record_activity",
            Task::RecordUserActivity { .. } => "record_user_activity",
            Task::NotifyAllUsers(_) => "notify_all_users",
        }
    }
}

/// Stores the worker writes to
#[derive(Clone)]
pub struct TaskHandlers {
    pub activity: Arc<dyn ActivityStore>,
    pub users: Arc<dyn UserStore>,
    pub notifications: Arc<dyn NotificationStore>,
}

impl TaskHandlers {
    async fn run(&self, task: Task) {
        match task {
            Task::RecordActivity(activity) => self.record(&activity).await,
            Task::RecordUserActivity {
                user_id,
                mut activity,
            } => {
                activity.actor = Some(self.actor(user_id).await);
                self.record(&activity).await;
            }
            Task::NotifyAllUsers(draft) => {
                deliver_to_all(self.users.as_ref(), self.notifications.as_ref(), &draft).await;
            }
        }
    }

    async fn record(&self, activity: &NewActivity) {
        if let Err(e) = self.activity.insert(activity).await {
            error!(
                error = %e,
                entity_type = %activity.entity_type,
                entity_id = %activity.entity_id,
                action = %activity.action,
                "Failed to record activity"
            );
        }
    }

    /// The name shown in the log. A failed lookup keeps the id only.
    async fn actor(&self, user_id: Uuid) -> Actor {
        let user_name = match self.users.find_by_id(user_id).await {
            Ok(Some(user)) => format!("{} {}", user.first_name, user.last_name),
            Ok(None) => user_id.to_string(),
            Err(e) => {
                warn!(error = %e, user_id = %user_id, "Failed to load actor name");
                user_id.to_string()
            }
        };

        Actor { user_id, user_name }
    }
}

/// Cloneable submission handle
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<Task>,
}

impl TaskQueue {
    /// Enqueue without waiting. Returns false when the task was dropped.
    pub fn submit(&self, task: Task) -> bool {
        match self.sender.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                warn!(task = task.kind(), "Background task queue is full, dropping task");
                false
            }
            Err(TrySendError::Closed(task)) => {
                warn!(task = task.kind(), "Background task queue is closed, dropping task");
                false
            }
        }
    }
}

/// Outcome of stopping the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks run after the shutdown signal
    pub completed: usize,
    /// Tasks dropped after the shutdown signal
    pub discarded: usize,
    /// The drain did not finish in time and the worker was aborted
    pub timed_out: bool,
}

/// Owner of the worker task
pub struct TaskWorker {
    shutdown: oneshot::Sender<ShutdownMode>,
    handle: JoinHandle<ShutdownReport>,
}

/// Start the worker and return its submission handle
pub fn spawn(capacity: usize, handlers: TaskHandlers) -> (TaskQueue, TaskWorker) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let (shutdown, shutdown_rx) = oneshot::channel();

    let handle = tokio::spawn(run(receiver, shutdown_rx, handlers));

    (TaskQueue { sender }, TaskWorker { shutdown, handle })
}

async fn run(
    mut receiver: mpsc::Receiver<Task>,
    mut shutdown_rx: oneshot::Receiver<ShutdownMode>,
    handlers: TaskHandlers,
) -> ShutdownReport {
    loop {
        tokio::select! {
            biased;

            mode = &mut shutdown_rx => {
                let mode = mode.unwrap_or_default();
                return finish(&mut receiver, mode, &handlers).await;
            }
            task = receiver.recv() => match task {
                Some(task) => handlers.run(task).await,
                None => return ShutdownReport::default(),
            },
        }
    }
}

async fn finish(
    receiver: &mut mpsc::Receiver<Task>,
    mode: ShutdownMode,
    handlers: &TaskHandlers,
) -> ShutdownReport {
    receiver.close();

    let mut report = ShutdownReport::default();
    while let Some(task) = receiver.recv().await {
        match mode {
            ShutdownMode::Drain => {
                handlers.run(task).await;
                report.completed += 1;
            }
            ShutdownMode::Discard => report.discarded += 1,
        }
    }

    report
}

impl TaskWorker {
    /// Stop accepting tasks, then drain or discard the backlog within `timeout`
    pub async fn shutdown(self, mode: ShutdownMode, timeout: Duration) -> ShutdownReport {
        info!("Stopping background worker ({:?})", mode);

        // The worker may already have exited if every queue handle was dropped.
        let _ = self.shutdown.send(mode);

        let abort = self.handle.abort_handle();
        let report = match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                error!(error = %e, "Background worker stopped abnormally");
                ShutdownReport::default()
            }
            Err(_) => {
                abort.abort();
                warn!("Background worker did not finish within {:?}", timeout);
                ShutdownReport {
                    timed_out: true,
                    ..ShutdownReport::default()
                }
            }
        };

        info!(
            completed = report.completed,
            discarded = report.discarded,
            "Background worker stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::InMemoryStore,
        models::{ActivityAction, EntityType},
    };

    fn handlers(store: &Arc<InMemoryStore>) -> TaskHandlers {
        TaskHandlers {
            activity: store.clone(),
            users: store.clone(),
            notifications: store.clone(),
        }
    }

    fn activity() -> Task {
        Task::RecordActivity(NewActivity {
            entity_type: EntityType::Server,
            entity_id: Uuid::new_v4(),
            entity_name: "web-01".to_string(),
            action: ActivityAction::Created,
            changes: vec![],
            actor: None,
        })
    }

    #[tokio::test]
    async fn drain_runs_queued_tasks() {
        let store = Arc::new(InMemoryStore::new());
        let (queue, worker) = spawn(8, handlers(&store));

        assert!(queue.submit(activity()));
        assert!(queue.submit(activity()));
        assert!(queue.submit(activity()));

        let report = worker
            .shutdown(ShutdownMode::Drain, Duration::from_secs(5))
            .await;
        assert_eq!(report.completed, 3);
        assert_eq!(report.discarded, 0);
        assert_eq!(store.activity_len().unwrap(), 3);
    }

    #[tokio::test]
    async fn discard_drops_queued_tasks() {
        let store = Arc::new(InMemoryStore::new());
        let (queue, worker) = spawn(8, handlers(&store));

        queue.submit(activity());
        queue.submit(activity());

        let report = worker
            .shutdown(ShutdownMode::Discard, Duration::from_secs(5))
            .await;
        assert_eq!(report.discarded, 2);
        assert_eq!(store.activity_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn full_or_closed_queue_drops_without_waiting() {
        let store = Arc::new(InMemoryStore::new());
        let (queue, worker) = spawn(1, handlers(&store));

        assert!(queue.submit(activity()));
        assert!(!queue.submit(activity()));

        worker
            .shutdown(ShutdownMode::Drain, Duration::from_secs(5))
            .await;
        assert!(!queue.submit(activity()));
    }

    #[tokio::test]
    async fn failed_writes_do_not_stop_the_worker() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_activity_writes(true);
        let (queue, worker) = spawn(8, handlers(&store));

        queue.submit(activity());
        tokio::task::yield_now().await;
        store.fail_activity_writes(false);
        queue.submit(activity());

        let report = worker
            .shutdown(ShutdownMode::Drain, Duration::from_secs(5))
            .await;
        assert!(!report.timed_out);
        assert_eq!(store.activity_len().unwrap(), 1);
    }

    #[tokio::test]
    async fn user_activity_is_attributed_by_the_worker() {
        let store = Arc::new(InMemoryStore::new());
        let (queue, worker) = spawn(8, handlers(&store));
        let user_id = Uuid::new_v4();

        let Task::RecordActivity(activity) = activity() else {
            unreachable!()
        };
        assert!(queue.submit(Task::RecordUserActivity { user_id, activity }));

        let report = worker
            .shutdown(ShutdownMode::Drain, Duration::from_secs(5))
            .await;
        assert!(!report.timed_out);

        let recorded = ActivityStore::recent(store.as_ref(), 10).await.unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].user_id, Some(user_id));
        assert_eq!(recorded[0].user_name, Some(user_id.to_string()));
    }
}
