use std::sync::Arc;

use tokio::{
    sync::{Mutex, mpsc::Receiver},
    task::JoinHandle,
};

use crate::engine::{judge::Judge, metrics::MetricsRegistry, queue::QueuedJob};

/// `workers` is the cap on concurrently running judgments.
pub fn spawn_worker_pool(
    workers: usize,
    receiver: Arc<Mutex<Receiver<QueuedJob>>>,
    judge: Arc<Judge>,
    metrics: Arc<MetricsRegistry>,
) -> Vec<JoinHandle<()>> {
    (0..workers.max(1))
        .map(|worker_id| {
            let receiver = receiver.clone();
            let judge = judge.clone();
            let metrics = metrics.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, receiver, judge, metrics).await;
            })
        })
        .collect()
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<Receiver<QueuedJob>>>,
    judge: Arc<Judge>,
    metrics: Arc<MetricsRegistry>,
) {
    loop {
        let job = {
            let mut locked = receiver.lock().await;
            locked.recv().await
        };
        let Some(job) = job else {
            tracing::info!(worker_id, "judge queue closed, worker exiting");
            break;
        };

        tracing::info!(worker_id, submission_id = %job.submission_id, "starting judgment");
        metrics.started();
        judge.run(job.submission_id).await;
    }
}
