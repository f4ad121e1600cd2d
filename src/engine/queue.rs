use std::sync::Arc;

use tokio::sync::{
    Mutex,
    mpsc::{self, Receiver, Sender, error::TrySendError},
};
use uuid::Uuid;

use crate::engine::{error::EngineError, metrics::MetricsRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedJob {
    pub submission_id: Uuid,
}

/// Bounded hand-off between request handlers and judgment workers.
#[derive(Clone)]
pub struct Scheduler {
    sender: Sender<QueuedJob>,
    receiver: Arc<Mutex<Receiver<QueuedJob>>>,
    metrics: Arc<MetricsRegistry>,
}

impl Scheduler {
    pub fn new(capacity: usize, metrics: Arc<MetricsRegistry>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            metrics,
        }
    }

    /// Never waits: a full queue is reported to the caller instead.
    pub fn submit(&self, job: QueuedJob) -> Result<(), EngineError> {
        match self.sender.try_send(job) {
            Ok(()) => {
                self.metrics.submitted();
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.rejected();
                Err(EngineError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                Err(EngineError::Internal("judge queue is closed".to_string()))
            }
        }
    }

    pub fn receiver(&self) -> Arc<Mutex<Receiver<QueuedJob>>> {
        self.receiver.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::{QueuedJob, Scheduler};
    use crate::engine::{error::EngineError, metrics::MetricsRegistry};

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let scheduler = Scheduler::new(1, Arc::new(MetricsRegistry::new()));
        let first = QueuedJob {
            submission_id: Uuid::new_v4(),
        };
        scheduler.submit(first).unwrap();
        let second = scheduler.submit(QueuedJob {
            submission_id: Uuid::new_v4(),
        });
        assert!(matches!(second, Err(EngineError::QueueFull)));

        let receiver = scheduler.receiver();
        let got = receiver.lock().await.recv().await;
        assert_eq!(got, Some(first));
    }
}
