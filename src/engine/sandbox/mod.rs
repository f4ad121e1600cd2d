mod context;
mod docker;
mod language;
mod process;
mod runner;

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use uuid::Uuid;

use crate::engine::{
    config::{SandboxBackendKind, SandboxConfig},
    models::SubmissionStatus,
};

pub use context::ExecutionContext;
pub use docker::DockerSandbox;
pub use language::{LanguageRegistry, LanguageSpec};
pub use process::ProcessSandbox;
pub use runner::SandboxRunner;

/// Name of the stdin copy written next to the source file.
pub const INPUT_FILE: &str = "input.txt";
pub const TIME_LIMIT_MESSAGE: &str = "Time limit exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "AC")]
    Accepted,
    #[serde(rename = "RE")]
    RuntimeError,
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
}

impl Outcome {
    pub fn verdict(self) -> SubmissionStatus {
        match self {
            Self::Accepted => SubmissionStatus::Accepted,
            Self::RuntimeError => SubmissionStatus::RuntimeError,
            Self::TimeLimitExceeded => SubmissionStatus::TimeLimitExceeded,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSpec {
    pub submission_id: Uuid,
    pub case_index: usize,
    pub language: String,
    pub code: Arc<str>,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseResult {
    pub outcome: Outcome,
    pub output: String,
    pub duration_ms: u128,
}

impl CaseResult {
    pub fn launch_failure(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::RuntimeError,
            output: message.into(),
            duration_ms: 0,
        }
    }
}

/// Runs one (program, input) pair to a classified outcome. Infallible by
/// contract: anything that prevents the program from running is reported
/// as [`Outcome::RuntimeError`] with the failure text as output.
#[async_trait]
pub trait Sandbox: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, spec: RunSpec) -> CaseResult;
}

/// Isolation mechanism underneath [`SandboxRunner`].
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Command that starts `language` inside `ctx`. Stdio is wired up by the
    /// caller.
    fn command(&self, ctx: &ExecutionContext, language: &LanguageSpec) -> Command;

    /// Forcibly stops `child` and everything it started. `pid` is the id
    /// captured at spawn; `child.id()` is gone once the child was reaped.
    async fn terminate(&self, ctx: &ExecutionContext, child: &mut Child, pid: Option<u32>);

    /// Called after `child` exited on its own. Anything it left running
    /// must not outlive the invocation.
    async fn reap(&self, ctx: &ExecutionContext, child: &mut Child, pid: Option<u32>) {
        self.terminate(ctx, child, pid).await;
    }
}

pub enum Race<T> {
    Finished(T),
    DeadlineElapsed,
}

/// First resolution wins: whichever of `fut` and the deadline completes
/// first decides the result and the other branch is dropped unpolled.
pub async fn race_deadline<F>(fut: F, limit: Duration) -> Race<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        out = fut => Race::Finished(out),
        _ = tokio::time::sleep(limit) => Race::DeadlineElapsed,
    }
}

pub struct SandboxFactory;

impl SandboxFactory {
    pub fn from_config(config: &SandboxConfig, languages: LanguageRegistry) -> Arc<dyn Sandbox> {
        let backend: Arc<dyn SandboxBackend> = match config.backend {
            SandboxBackendKind::Docker => Arc::new(DockerSandbox::new(config)),
            SandboxBackendKind::Process => Arc::new(ProcessSandbox::new()),
        };
        Arc::new(SandboxRunner::new(backend, languages, config))
    }
}
