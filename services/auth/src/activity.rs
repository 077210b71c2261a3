//! Activity recorder
//!
//! `record` hands the entry to the background worker and returns at once. It
//! must only be called after the change it describes has been committed.

use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AuthResult,
    models::{ActivityLogEntry, ActivityQuery, NewActivity, Page, Paginated},
    repositories::ActivityStore,
    tasks::{Task, TaskQueue},
};

const SEARCH_DEFAULT_LIMIT: i64 = 50;
const SEARCH_MAX_LIMIT: i64 = 100;
const RECENT_DEFAULT_LIMIT: i64 = 10;
const RECENT_MAX_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct ActivityRecorder {
    store: Arc<dyn ActivityStore>,
    tasks: TaskQueue,
}

impl ActivityRecorder {
    pub fn new(store: Arc<dyn ActivityStore>, tasks: TaskQueue) -> Self {
        Self { store, tasks }
    }

    /// Queue an audit entry. The outcome is never reported to the caller.
    pub fn record(&self, activity: NewActivity) {
        self.tasks.submit(Task::RecordActivity(activity));
    }

    /// Queue an audit entry performed by `user_id`. The worker fills in the
    /// actor's display name.
    pub fn record_by(&self, user_id: Uuid, activity: NewActivity) {
        self.tasks
            .submit(Task::RecordUserActivity { user_id, activity });
    }

    pub async fn search(&self, query: &ActivityQuery) -> AuthResult<Paginated<ActivityLogEntry>> {
        let page = Page::new(
            query.limit,
            query.offset,
            SEARCH_DEFAULT_LIMIT,
            SEARCH_MAX_LIMIT,
        );
        let (items, total) = self.store.search(&query.filter(), page).await?;

        Ok(Paginated::new(items, total, page))
    }

    pub async fn recent(&self, limit: Option<i64>) -> AuthResult<Vec<ActivityLogEntry>> {
        let page = Page::new(limit, None, RECENT_DEFAULT_LIMIT, RECENT_MAX_LIMIT);
        Ok(self.store.recent(page.limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ShutdownMode,
        memory::InMemoryStore,
        models::{ActivityAction, Actor, ChangeSet, EntityType},
        tasks::{self, TaskHandlers},
    };
    use std::time::Duration;
    use uuid::Uuid;

    fn recorder(store: &Arc<InMemoryStore>) -> (ActivityRecorder, tasks::TaskWorker) {
        let (queue, worker) = tasks::spawn(
            64,
            TaskHandlers {
                activity: store.clone(),
                users: store.clone(),
                notifications: store.clone(),
            },
        );
        (ActivityRecorder::new(store.clone(), queue), worker)
    }

    fn entry(entity_type: EntityType, action: ActivityAction) -> NewActivity {
        let mut changes = ChangeSet::new();
        changes.track("status", "RUNNING", "ERROR");
        NewActivity {
            entity_type,
            entity_id: Uuid::new_v4(),
            entity_name: "vm-1".to_string(),
            action,
            changes: changes.into_changes(),
            actor: Some(Actor {
                user_id: Uuid::new_v4(),
                user_name: "Ada Ops".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn search_filters_and_pages_newest_first() {
        let store = Arc::new(InMemoryStore::new());
        let (recorder, worker) = recorder(&store);

        for _ in 0..3 {
            recorder.record(entry(EntityType::Vm, ActivityAction::StatusChanged));
        }
        recorder.record(entry(EntityType::Server, ActivityAction::Created));
        worker
            .shutdown(ShutdownMode::Drain, Duration::from_secs(5))
            .await;

        let vms = recorder
            .search(&ActivityQuery {
                entity_type: Some(EntityType::Vm),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(vms.total, 3);
        assert_eq!(vms.items.len(), 2);
        assert_eq!(vms.limit, 2);

        let recent = recorder.recent(Some(500)).await.unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].entity_type, EntityType::Server);
        assert_eq!(recent[1].changes[0].field, "status");
        assert_eq!(recent[1].user_name.as_deref(), Some("Ada Ops"));
    }

    #[tokio::test]
    async fn failed_audit_writes_are_absorbed() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_activity_writes(true);
        let (recorder, worker) = recorder(&store);

        recorder.record(entry(EntityType::Server, ActivityAction::Deleted));
        let report = worker
            .shutdown(ShutdownMode::Drain, Duration::from_secs(5))
            .await;

        assert_eq!(report.completed, 1);
        assert!(recorder.recent(None).await.unwrap().is_empty());
    }
}
