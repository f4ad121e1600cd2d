use std::sync::Arc;

use uuid::Uuid;

use crate::engine::{
    error::EngineError,
    models::{CreateSubmissionRequest, Submission},
    queue::{QueuedJob, Scheduler},
    store::SubmissionStore,
};

/// Entry point for new submissions: validate, persist as `QUEUED`, hand
/// the id to the judgment queue and return without waiting.
#[derive(Clone)]
pub struct SubmissionService {
    store: Arc<dyn SubmissionStore>,
    scheduler: Scheduler,
    max_code_bytes: usize,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn SubmissionStore>, scheduler: Scheduler, max_code_bytes: usize) -> Self {
        Self {
            store,
            scheduler,
            max_code_bytes,
        }
    }

    pub async fn create(
        &self,
        request: CreateSubmissionRequest,
        user_id: &str,
    ) -> Result<Submission, EngineError> {
        let problem_id = required(request.problem_id, "problemId")?;
        let language = required(request.language, "language")?;
        let code = required(request.code, "code")?;
        if code.len() > self.max_code_bytes {
            return Err(EngineError::Validation(format!(
                "code exceeds {} bytes",
                self.max_code_bytes
            )));
        }

        let submission = Submission::queued(
            user_id.to_string(),
            problem_id.trim().to_string(),
            language.trim().to_ascii_lowercase(),
            code,
        );
        let id = submission.id;
        self.store.insert(submission.clone()).await?;

        // Only a successful enqueue dispatches; a rejected record is dropped
        // so nothing lingers in QUEUED without a worker behind it.
        if let Err(err) = self.scheduler.submit(QueuedJob { submission_id: id }) {
            self.store.remove(&id).await;
            tracing::warn!(submission_id = %id, error = %err, "submission rejected");
            return Err(err);
        }

        tracing::info!(
            submission_id = %id,
            user_id,
            problem_id = %submission.problem_id,
            language = %submission.language,
            "submission queued"
        );
        Ok(submission)
    }

    pub async fn get(&self, id: &Uuid) -> Result<Submission, EngineError> {
        self.store.get(id).await.ok_or(EngineError::NotFound)
    }

    pub async fn list_by_user(&self, user_id: &str) -> Vec<Submission> {
        self.store.list_by_user(user_id).await
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, EngineError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EngineError::Validation(format!("{field} is required"))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::SubmissionService;
    use crate::engine::{
        error::EngineError,
        metrics::MetricsRegistry,
        models::{CreateSubmissionRequest, SubmissionStatus},
        queue::Scheduler,
        store::{MemoryStore, SubmissionStore},
    };

    fn request(problem: Option<&str>, language: Option<&str>, code: Option<&str>) -> CreateSubmissionRequest {
        CreateSubmissionRequest {
            problem_id: problem.map(str::to_string),
            language: language.map(str::to_string),
            code: code.map(str::to_string),
        }
    }

    fn service(capacity: usize) -> (SubmissionService, Arc<MemoryStore>, Scheduler) {
        let store = Arc::new(MemoryStore::new(None));
        let scheduler = Scheduler::new(capacity, Arc::new(MetricsRegistry::new()));
        (
            SubmissionService::new(store.clone(), scheduler.clone(), 1024),
            store,
            scheduler,
        )
    }

    #[tokio::test]
    async fn create_persists_queued_and_enqueues_once() {
        let (service, store, scheduler) = service(4);

        let created = service
            .create(request(Some("sum"), Some("Python"), Some("print(3)")), "alice")
            .await
            .unwrap();

        assert_eq!(created.status, SubmissionStatus::Queued);
        assert_eq!(created.output, "");
        assert_eq!(created.user_id, "alice");
        assert_eq!(created.language, "python");
        assert_eq!(store.get(&created.id).await.unwrap(), created);

        let receiver = scheduler.receiver();
        let mut receiver = receiver.lock().await;
        assert_eq!(receiver.recv().await.unwrap().submission_id, created.id);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_before_persistence() {
        let (service, store, _scheduler) = service(4);

        for req in [
            request(None, Some("python"), Some("x")),
            request(Some("sum"), None, Some("x")),
            request(Some("sum"), Some("python"), None),
            request(Some("sum"), Some("python"), Some("   ")),
        ] {
            let err = service.create(req, "alice").await;
            assert!(matches!(err, Err(EngineError::Validation(_))));
        }
        assert!(store.list_by_user("alice").await.is_empty());
    }

    #[tokio::test]
    async fn oversized_code_is_rejected() {
        let (service, _store, _scheduler) = service(4);
        let code = "x".repeat(2048);
        let err = service
            .create(request(Some("sum"), Some("python"), Some(&code)), "alice")
            .await;
        assert!(matches!(err, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn full_queue_leaves_no_record_behind() {
        let (service, store, _scheduler) = service(1);
        service
            .create(request(Some("sum"), Some("python"), Some("a")), "alice")
            .await
            .unwrap();

        let err = service
            .create(request(Some("sum"), Some("python"), Some("b")), "alice")
            .await;
        assert!(matches!(err, Err(EngineError::QueueFull)));
        assert_eq!(store.list_by_user("alice").await.len(), 1);
    }
}
