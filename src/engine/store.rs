use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry as Slot};
use thiserror::Error;
use tokio::{
    io::AsyncWriteExt,
    sync::{Mutex, watch},
};
use uuid::Uuid;

use crate::engine::models::{Submission, SubmissionStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("submission {0} not found")]
    NotFound(Uuid),
    #[error("submission {0} already exists")]
    Duplicate(Uuid),
    #[error("submission {id}: illegal status transition {from} -> {to}")]
    InvalidTransition {
        id: Uuid,
        from: SubmissionStatus,
        to: SubmissionStatus,
    },
}

/// Owner of every submission record. Judging code never keeps its own copy
/// across a write; all mutations go through [`SubmissionStore::transition`].
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert(&self, submission: Submission) -> Result<(), StoreError>;

    async fn get(&self, id: &Uuid) -> Option<Submission>;

    /// Submissions of one user in creation order.
    async fn list_by_user(&self, user_id: &str) -> Vec<Submission>;

    async fn remove(&self, id: &Uuid);

    /// Sets `status` (and `output` when given) atomically. Rejects any edge
    /// outside `QUEUED -> RUNNING -> terminal`.
    async fn transition(
        &self,
        id: Uuid,
        status: SubmissionStatus,
        output: Option<String>,
    ) -> Result<Submission, StoreError>;

    /// Status feed for one submission. Polling reads `get`; push-style
    /// consumers await changes on the returned receiver.
    fn watch(&self, id: &Uuid) -> Option<watch::Receiver<SubmissionStatus>>;
}

struct Entry {
    seq: u64,
    submission: Submission,
    status_tx: watch::Sender<SubmissionStatus>,
}

#[derive(Clone)]
pub struct MemoryStore {
    records: Arc<DashMap<Uuid, Entry>>,
    next_seq: Arc<AtomicU64>,
    persistence_path: Option<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            next_seq: Arc::new(AtomicU64::new(0)),
            persistence_path,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn journal(&self, record: &Submission) {
        let Some(path) = &self.persistence_path else {
            return;
        };
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(submission_id = %record.id, error = %err, "failed to encode journal entry");
                return;
            }
        };

        let _guard = self.write_lock.lock().await;
        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        let result = match options.open(path).await {
            Ok(mut file) => {
                let mut bytes = line.into_bytes();
                bytes.push(b'\n');
                file.write_all(&bytes).await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            tracing::warn!(
                submission_id = %record.id,
                path = %path.display(),
                error = %err,
                "failed to append journal entry"
            );
        }
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, submission: Submission) -> Result<(), StoreError> {
        let id = submission.id;
        match self.records.entry(id) {
            Slot::Occupied(_) => Err(StoreError::Duplicate(id)),
            Slot::Vacant(slot) => {
                let (status_tx, _) = watch::channel(submission.status);
                slot.insert(Entry {
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    submission,
                    status_tx,
                });
                Ok(())
            }
        }
    }

    async fn get(&self, id: &Uuid) -> Option<Submission> {
        self.records.get(id).map(|e| e.submission.clone())
    }

    async fn list_by_user(&self, user_id: &str) -> Vec<Submission> {
        let mut owned: Vec<(u64, Submission)> = self
            .records
            .iter()
            .filter(|e| e.submission.user_id == user_id)
            .map(|e| (e.seq, e.submission.clone()))
            .collect();
        owned.sort_by_key(|(seq, _)| *seq);
        owned.into_iter().map(|(_, s)| s).collect()
    }

    async fn remove(&self, id: &Uuid) {
        self.records.remove(id);
    }

    async fn transition(
        &self,
        id: Uuid,
        status: SubmissionStatus,
        output: Option<String>,
    ) -> Result<Submission, StoreError> {
        let snapshot = {
            let mut entry = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            let from = entry.submission.status;
            if !from.can_transition_to(status) {
                return Err(StoreError::InvalidTransition {
                    id,
                    from,
                    to: status,
                });
            }
            entry.submission.status = status;
            if let Some(output) = output {
                entry.submission.output = output;
            }
            entry.submission.updated_at = Utc::now();
            entry.status_tx.send_replace(status);
            entry.submission.clone()
        };

        if status.is_terminal() {
            self.journal(&snapshot).await;
        }
        Ok(snapshot)
    }

    fn watch(&self, id: &Uuid) -> Option<watch::Receiver<SubmissionStatus>> {
        self.records.get(id).map(|e| e.status_tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStore, StoreError, SubmissionStore};
    use crate::engine::models::{Submission, SubmissionStatus};

    fn submission(user: &str) -> Submission {
        Submission::queued(
            user.to_string(),
            "p1".to_string(),
            "python".to_string(),
            "print(1)".to_string(),
        )
    }

    #[tokio::test]
    async fn lists_user_submissions_in_creation_order() {
        let store = MemoryStore::new(None);
        let first = submission("alice");
        let other = submission("bob");
        let second = submission("alice");
        for s in [&first, &other, &second] {
            store.insert(s.clone()).await.unwrap();
        }

        let ids: Vec<_> = store
            .list_by_user("alice")
            .await
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert!(store.list_by_user("carol").await.is_empty());
    }

    #[tokio::test]
    async fn rejects_duplicate_ids() {
        let store = MemoryStore::new(None);
        let s = submission("alice");
        store.insert(s.clone()).await.unwrap();
        assert!(matches!(
            store.insert(s).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn terminal_status_never_regresses() {
        let store = MemoryStore::new(None);
        let s = submission("alice");
        let id = s.id;
        store.insert(s).await.unwrap();

        store
            .transition(id, SubmissionStatus::Running, None)
            .await
            .unwrap();
        let done = store
            .transition(id, SubmissionStatus::WrongAnswer, Some("6".to_string()))
            .await
            .unwrap();
        assert_eq!(done.output, "6");

        for next in [
            SubmissionStatus::Queued,
            SubmissionStatus::Running,
            SubmissionStatus::Accepted,
        ] {
            let err = store.transition(id, next, Some("x".to_string())).await;
            assert!(matches!(err, Err(StoreError::InvalidTransition { .. })));
        }

        let first = store.get(&id).await.unwrap();
        let second = store.get(&id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.status, SubmissionStatus::WrongAnswer);
        assert_eq!(first.output, "6");
    }

    #[tokio::test]
    async fn queued_cannot_skip_running() {
        let store = MemoryStore::new(None);
        let s = submission("alice");
        let id = s.id;
        store.insert(s).await.unwrap();

        let err = store
            .transition(id, SubmissionStatus::Accepted, None)
            .await;
        assert!(matches!(err, Err(StoreError::InvalidTransition { .. })));
        assert!(matches!(
            store
                .transition(uuid::Uuid::new_v4(), SubmissionStatus::Running, None)
                .await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn watchers_observe_status_changes() {
        let store = MemoryStore::new(None);
        let s = submission("alice");
        let id = s.id;
        store.insert(s).await.unwrap();

        let mut rx = store.watch(&id).unwrap();
        assert_eq!(*rx.borrow(), SubmissionStatus::Queued);

        store
            .transition(id, SubmissionStatus::Running, None)
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SubmissionStatus::Running);
        assert!(store.watch(&uuid::Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn journals_terminal_records_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let store = MemoryStore::new(Some(path.clone()));
        let s = submission("alice");
        let id = s.id;
        store.insert(s).await.unwrap();

        store
            .transition(id, SubmissionStatus::Running, None)
            .await
            .unwrap();
        assert!(!path.exists());

        store
            .transition(id, SubmissionStatus::Accepted, None)
            .await
            .unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: Submission = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.status, SubmissionStatus::Accepted);
    }
}
