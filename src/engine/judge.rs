use std::sync::Arc;

use uuid::Uuid;

use crate::engine::{
    compare,
    metrics::MetricsRegistry,
    models::{Submission, SubmissionStatus},
    problems::ProblemSource,
    sandbox::{Outcome, RunSpec, Sandbox},
    store::SubmissionStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: SubmissionStatus,
    pub output: String,
    /// Index of the first case that did not pass.
    pub failed_case: Option<usize>,
}

impl Verdict {
    fn infrastructure(message: String) -> Self {
        Self {
            status: SubmissionStatus::RuntimeError,
            output: message,
            failed_case: None,
        }
    }
}

/// Drives one submission through its problem's test cases, strictly in
/// order and one sandbox at a time, stopping at the first failure.
pub struct Judge {
    store: Arc<dyn SubmissionStore>,
    problems: Arc<dyn ProblemSource>,
    sandbox: Arc<dyn Sandbox>,
    metrics: Arc<MetricsRegistry>,
}

impl Judge {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        problems: Arc<dyn ProblemSource>,
        sandbox: Arc<dyn Sandbox>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            store,
            problems,
            sandbox,
            metrics,
        }
    }

    /// All effects are store writes. A submission that is not `QUEUED` is
    /// left untouched, so a second dispatch of the same id is a no-op.
    pub async fn run(&self, submission_id: Uuid) {
        let submission = match self
            .store
            .transition(submission_id, SubmissionStatus::Running, None)
            .await
        {
            Ok(submission) => submission,
            Err(err) => {
                tracing::warn!(%submission_id, error = %err, "refusing to judge submission");
                return;
            }
        };

        let verdict = self.evaluate(&submission).await;
        self.metrics.verdict(verdict.status);

        match self
            .store
            .transition(submission_id, verdict.status, Some(verdict.output))
            .await
        {
            Ok(_) => tracing::info!(
                %submission_id,
                sandbox_backend = self.sandbox.name(),
                status = %verdict.status,
                failed_case = ?verdict.failed_case,
                "judgment finished"
            ),
            Err(err) => tracing::error!(
                %submission_id,
                error = %err,
                "failed to record verdict"
            ),
        }
    }

    pub async fn evaluate(&self, submission: &Submission) -> Verdict {
        let problem = match self.problems.find(&submission.problem_id).await {
            Ok(Some(problem)) => problem,
            Ok(None) => {
                tracing::warn!(
                    submission_id = %submission.id,
                    problem_id = %submission.problem_id,
                    "problem not found"
                );
                return Verdict::infrastructure(format!(
                    "problem {} not found",
                    submission.problem_id
                ));
            }
            Err(err) => {
                tracing::error!(submission_id = %submission.id, error = %err, "problem lookup failed");
                return Verdict::infrastructure(err.to_string());
            }
        };

        let code: Arc<str> = Arc::from(submission.code.as_str());
        for (index, case) in problem.test_cases.iter().enumerate() {
            self.metrics.sandbox_run();
            let result = self
                .sandbox
                .execute(RunSpec {
                    submission_id: submission.id,
                    case_index: index,
                    language: submission.language.clone(),
                    code: code.clone(),
                    input: case.input.clone(),
                })
                .await;

            tracing::debug!(
                submission_id = %submission.id,
                case_index = index,
                outcome = ?result.outcome,
                duration_ms = result.duration_ms as u64,
                "test case finished"
            );

            if result.outcome != Outcome::Accepted {
                return Verdict {
                    status: result.outcome.verdict(),
                    output: result.output,
                    failed_case: Some(index),
                };
            }
            if !compare::matches(&result.output, &case.expected_output) {
                return Verdict {
                    status: SubmissionStatus::WrongAnswer,
                    output: result.output,
                    failed_case: Some(index),
                };
            }
        }

        Verdict {
            status: SubmissionStatus::Accepted,
            output: String::new(),
            failed_case: None,
        }
    }
}
