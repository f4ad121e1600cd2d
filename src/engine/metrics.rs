use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::models::SubmissionStatus;

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    submitted_total: AtomicU64,
    rejected_total: AtomicU64,
    started_total: AtomicU64,
    sandbox_runs_total: AtomicU64,
    accepted_total: AtomicU64,
    wrong_answer_total: AtomicU64,
    runtime_error_total: AtomicU64,
    time_limit_total: AtomicU64,
    queue_depth: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) {
        self.submitted_total.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn started(&self) {
        self.started_total.fetch_add(1, Ordering::Relaxed);
        self.decrement_queue_depth();
    }

    pub fn sandbox_run(&self) {
        self.sandbox_runs_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn verdict(&self, status: SubmissionStatus) {
        let counter = match status {
            SubmissionStatus::Accepted => &self.accepted_total,
            SubmissionStatus::WrongAnswer => &self.wrong_answer_total,
            SubmissionStatus::RuntimeError => &self.runtime_error_total,
            SubmissionStatus::TimeLimitExceeded => &self.time_limit_total,
            SubmissionStatus::Queued | SubmissionStatus::Running => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sandbox_runs(&self) -> u64 {
        self.sandbox_runs_total.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        format!(
            concat!(
                "# TYPE judge_submitted_total counter\n",
                "judge_submitted_total {}\n",
                "# TYPE judge_rejected_total counter\n",
                "judge_rejected_total {}\n",
                "# TYPE judge_started_total counter\n",
                "judge_started_total {}\n",
                "# TYPE judge_sandbox_runs_total counter\n",
                "judge_sandbox_runs_total {}\n",
                "# TYPE judge_verdicts_total counter\n",
                "judge_verdicts_total{{verdict=\"AC\"}} {}\n",
                "judge_verdicts_total{{verdict=\"WA\"}} {}\n",
                "judge_verdicts_total{{verdict=\"RE\"}} {}\n",
                "judge_verdicts_total{{verdict=\"TLE\"}} {}\n",
                "# TYPE judge_queue_depth gauge\n",
                "judge_queue_depth {}\n"
            ),
            self.submitted_total.load(Ordering::Relaxed),
            self.rejected_total.load(Ordering::Relaxed),
            self.started_total.load(Ordering::Relaxed),
            self.sandbox_runs_total.load(Ordering::Relaxed),
            self.accepted_total.load(Ordering::Relaxed),
            self.wrong_answer_total.load(Ordering::Relaxed),
            self.runtime_error_total.load(Ordering::Relaxed),
            self.time_limit_total.load(Ordering::Relaxed),
            self.queue_depth.load(Ordering::Relaxed),
        )
    }

    fn decrement_queue_depth(&self) {
        let mut current = self.queue_depth.load(Ordering::Relaxed);
        while current > 0 {
            match self.queue_depth.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MetricsRegistry;
    use crate::engine::models::SubmissionStatus;

    #[test]
    fn queue_depth_does_not_underflow() {
        let metrics = MetricsRegistry::new();
        metrics.started();
        let rendered = metrics.render_prometheus();
        assert!(rendered.contains("judge_queue_depth 0"));
    }

    #[test]
    fn verdicts_are_counted_per_status() {
        let metrics = MetricsRegistry::new();
        metrics.verdict(SubmissionStatus::WrongAnswer);
        metrics.verdict(SubmissionStatus::WrongAnswer);
        metrics.verdict(SubmissionStatus::TimeLimitExceeded);
        metrics.verdict(SubmissionStatus::Running);

        let rendered = metrics.render_prometheus();
        assert!(rendered.contains("judge_verdicts_total{verdict=\"WA\"} 2\n"));
        assert!(rendered.contains("judge_verdicts_total{verdict=\"TLE\"} 1\n"));
        assert!(rendered.contains("judge_verdicts_total{verdict=\"AC\"} 0\n"));
    }
}
