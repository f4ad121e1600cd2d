use std::os::unix::process::CommandExt;

use async_trait::async_trait;
use nix::{
    sys::signal::{Signal, killpg},
    unistd::Pid,
};
use tokio::process::{Child, Command};

use crate::engine::sandbox::{ExecutionContext, LanguageSpec, SandboxBackend};

/// Runs the interpreter directly on the host in its own process group.
/// No isolation beyond a scrubbed environment and a private working
/// directory; meant for development machines and tests.
pub struct ProcessSandbox;

impl ProcessSandbox {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProcessSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxBackend for ProcessSandbox {
    fn name(&self) -> &'static str {
        "process"
    }

    fn command(&self, ctx: &ExecutionContext, language: &LanguageSpec) -> Command {
        let mut cmd = std::process::Command::new(&language.command[0]);
        cmd.args(&language.command[1..])
            .current_dir(ctx.path())
            .env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .env("LANG", "C.UTF-8")
            .process_group(0);
        Command::from(cmd)
    }

    async fn terminate(&self, _ctx: &ExecutionContext, child: &mut Child, pid: Option<u32>) {
        if let Some(pid) = pid.or_else(|| child.id()) {
            // The child leads its own group, so this reaches every descendant.
            if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                // ESRCH: the whole group is already gone.
                tracing::debug!(pid, error = %err, "killpg failed");
            }
        }
        let _ = child.kill().await;
    }
}
