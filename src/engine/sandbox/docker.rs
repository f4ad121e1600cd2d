use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::engine::{
    config::SandboxConfig,
    sandbox::{ExecutionContext, LanguageSpec, SandboxBackend},
};

const CONTAINER_WORKDIR: &str = "/code";
const KILL_TIMEOUT: Duration = Duration::from_secs(10);

/// One throwaway container per invocation: no network, capped memory, cpu
/// and pids, the execution context mounted read-only at `/code`.
pub struct DockerSandbox {
    docker_bin: String,
    memory_mb: u64,
    cpus: f32,
    max_processes: u64,
}

impl DockerSandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            docker_bin: config.docker_bin.clone(),
            memory_mb: config.memory_mb,
            cpus: config.cpus,
            max_processes: config.max_processes,
        }
    }

    fn run_args(&self, ctx: &ExecutionContext, language: &LanguageSpec) -> Vec<String> {
        let memory = format!("{}m", self.memory_mb);
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-i".to_string(),
            "--name".to_string(),
            ctx.label().to_string(),
            "--network".to_string(),
            "none".to_string(),
            "--memory".to_string(),
            memory.clone(),
            "--memory-swap".to_string(),
            memory,
            "--cpus".to_string(),
            format!("{:.2}", self.cpus),
            "--pids-limit".to_string(),
            self.max_processes.to_string(),
            "--security-opt".to_string(),
            "no-new-privileges".to_string(),
            "-v".to_string(),
            format!("{}:{CONTAINER_WORKDIR}:ro", ctx.path().display()),
            "-w".to_string(),
            CONTAINER_WORKDIR.to_string(),
            language.image.clone(),
        ];
        args.extend(language.command.iter().cloned());
        args
    }
}

#[async_trait]
impl SandboxBackend for DockerSandbox {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn command(&self, ctx: &ExecutionContext, language: &LanguageSpec) -> Command {
        let mut cmd = Command::new(&self.docker_bin);
        cmd.args(self.run_args(ctx, language));
        cmd
    }

    async fn terminate(&self, ctx: &ExecutionContext, child: &mut Child, _pid: Option<u32>) {
        // Killing the docker CLI leaves the container running; stop it by name.
        let mut kill = Command::new(&self.docker_bin);
        kill.args(["kill", ctx.label()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        match tokio::time::timeout(KILL_TIMEOUT, kill.status()).await {
            Ok(Ok(status)) if !status.success() => {
                tracing::warn!(container = ctx.label(), %status, "docker kill reported failure");
            }
            Ok(Err(err)) => {
                tracing::warn!(container = ctx.label(), error = %err, "docker kill could not start");
            }
            Err(_) => {
                tracing::warn!(container = ctx.label(), "docker kill timed out");
            }
            Ok(Ok(_)) => {}
        }
        let _ = child.kill().await;
    }

    /// The container dies with its init process, taking every other
    /// process in it along; `--rm` removes it.
    async fn reap(&self, _ctx: &ExecutionContext, _child: &mut Child, _pid: Option<u32>) {}
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::DockerSandbox;
    use crate::engine::{
        config::SandboxConfig,
        sandbox::{ExecutionContext, LanguageRegistry},
    };

    #[tokio::test]
    async fn run_args_isolate_the_container() {
        let sandbox = DockerSandbox::new(&SandboxConfig::default());
        let registry = LanguageRegistry::builtin();
        let js = registry.get("javascript").unwrap();
        let ctx = ExecutionContext::create(None, Uuid::new_v4(), 0, js, "1", "")
            .await
            .unwrap();

        let args = sandbox.run_args(&ctx, js);
        let joined = args.join(" ");
        assert!(joined.starts_with("run --rm -i --name judge-"));
        assert!(joined.contains("--network none"));
        assert!(joined.contains("--memory 256m --memory-swap 256m"));
        assert!(joined.contains("--pids-limit 64"));
        assert!(joined.contains(&format!("{}:/code:ro", ctx.path().display())));
        assert!(joined.ends_with("node:22-alpine node code.js"));
        let name_at = args.iter().position(|a| a == "--name").unwrap();
        assert_eq!(args[name_at + 1], ctx.label());
    }
}
