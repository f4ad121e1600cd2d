use std::{
    path::PathBuf,
    process::Stdio,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    task::JoinHandle,
    time::Instant,
};

use crate::engine::{
    config::SandboxConfig,
    sandbox::{
        CaseResult, ExecutionContext, LanguageRegistry, Outcome, Race, RunSpec, Sandbox,
        SandboxBackend, TIME_LIMIT_MESSAGE, race_deadline,
    },
};

/// How long to keep draining pipes after the program exited. Bounds the
/// wait when a stray descendant still holds stdout open.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

pub struct SandboxRunner {
    backend: Arc<dyn SandboxBackend>,
    languages: LanguageRegistry,
    time_limit: Duration,
    max_output_bytes: usize,
    work_dir: Option<PathBuf>,
}

impl SandboxRunner {
    pub fn new(
        backend: Arc<dyn SandboxBackend>,
        languages: LanguageRegistry,
        config: &SandboxConfig,
    ) -> Self {
        Self {
            backend,
            languages,
            time_limit: config.time_limit,
            max_output_bytes: config.max_output_bytes,
            work_dir: config.work_dir.clone(),
        }
    }

    async fn run(&self, spec: &RunSpec) -> (Outcome, String) {
        let Some(language) = self.languages.get(&spec.language) else {
            return (
                Outcome::RuntimeError,
                format!("unsupported language: {}", spec.language),
            );
        };

        // Dropped on every return below, taking the directory with it.
        let ctx = match ExecutionContext::create(
            self.work_dir.as_deref(),
            spec.submission_id,
            spec.case_index,
            language,
            &spec.code,
            &spec.input,
        )
        .await
        {
            Ok(ctx) => ctx,
            Err(err) => return (Outcome::RuntimeError, format!("{err:#}")),
        };

        let mut cmd = self.backend.command(&ctx, language);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                return (
                    Outcome::RuntimeError,
                    format!("failed to start {} sandbox: {err}", self.backend.name()),
                );
            }
        };

        let pid = child.id();
        if let Some(mut stdin) = child.stdin.take() {
            let input = spec.input.clone().into_bytes();
            tokio::spawn(async move {
                // A program that never reads stdin closes the pipe early.
                let _ = stdin.write_all(&input).await;
            });
        }
        let stdout = PipeReader::spawn(child.stdout.take(), self.max_output_bytes);
        let stderr = PipeReader::spawn(child.stderr.take(), self.max_output_bytes);

        match race_deadline(child.wait(), self.time_limit).await {
            Race::DeadlineElapsed => {
                self.backend.terminate(&ctx, &mut child, pid).await;
                stdout.abort();
                stderr.abort();
                (Outcome::TimeLimitExceeded, TIME_LIMIT_MESSAGE.to_string())
            }
            Race::Finished(Err(err)) => {
                self.backend.terminate(&ctx, &mut child, pid).await;
                stdout.abort();
                stderr.abort();
                (
                    Outcome::RuntimeError,
                    format!("failed to wait for sandbox: {err}"),
                )
            }
            Race::Finished(Ok(status)) => {
                // Leftover descendants would hold the pipes open.
                self.backend.reap(&ctx, &mut child, pid).await;
                let drain_until = Instant::now() + DRAIN_GRACE;
                let stdout = stdout.finish(drain_until).await;
                let stderr = stderr.finish(drain_until).await;
                if status.success() {
                    (Outcome::Accepted, stdout)
                } else {
                    tracing::debug!(
                        submission_id = %spec.submission_id,
                        case_index = spec.case_index,
                        %status,
                        "program exited unsuccessfully"
                    );
                    (Outcome::RuntimeError, stderr)
                }
            }
        }
    }
}

#[async_trait]
impl Sandbox for SandboxRunner {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    async fn execute(&self, spec: RunSpec) -> CaseResult {
        let started = Instant::now();
        let (outcome, output) = self.run(&spec).await;
        CaseResult {
            outcome,
            output,
            duration_ms: started.elapsed().as_millis(),
        }
    }
}

/// Background copy of one output pipe. Bytes land in a shared buffer as
/// they are read, so a reader cut short still yields what it saw.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let task = tokio::spawn(async move {
            if let Some(pipe) = pipe {
                read_limited(pipe, limit, &sink).await;
            }
        });
        Self { buf, task }
    }

    fn abort(&self) {
        self.task.abort();
    }

    /// Waits for EOF until `until`, then returns whatever was captured.
    async fn finish(mut self, until: Instant) -> String {
        if tokio::time::timeout_at(until, &mut self.task).await.is_err() {
            self.task.abort();
        }
        let bytes = std::mem::take(&mut *lock(&self.buf));
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps the first `limit` bytes and discards the rest while still draining
/// the pipe so the writer never blocks.
async fn read_limited<R>(mut reader: R, limit: usize, sink: &Mutex<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut out = lock(sink);
                if out.len() < limit {
                    let remaining = limit - out.len();
                    out.extend_from_slice(&chunk[..remaining.min(n)]);
                }
            }
        }
    }
}
