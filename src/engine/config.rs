use std::{
    collections::HashMap,
    env,
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bind_addr: SocketAddr,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub sandbox: SandboxConfig,
    pub max_code_bytes: usize,
    /// api key -> user id
    pub api_keys: HashMap<String, String>,
    pub problems_path: Option<PathBuf>,
    pub languages_path: Option<PathBuf>,
    pub persistence_path: Option<PathBuf>,
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub backend: SandboxBackendKind,
    pub time_limit: Duration,
    pub max_output_bytes: usize,
    pub memory_mb: u64,
    pub cpus: f32,
    pub max_processes: u64,
    pub docker_bin: String,
    pub work_dir: Option<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: SandboxBackendKind::Docker,
            time_limit: Duration::from_millis(5000),
            max_output_bytes: 64 * 1024,
            memory_mb: 256,
            cpus: 0.5,
            max_processes: 64,
            docker_bin: "docker".to_string(),
            work_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = SandboxConfig::default();
        Self {
            bind_addr: env_parse("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080))),
            worker_count: env_parse("WORKER_COUNT", 4usize),
            queue_capacity: env_parse("QUEUE_CAPACITY", 1024usize),
            sandbox: SandboxConfig {
                backend: env_parse("SANDBOX_BACKEND", defaults.backend),
                time_limit: Duration::from_millis(
                    env_parse("TIME_LIMIT_MS", 5000u64).clamp(50, 120_000),
                ),
                max_output_bytes: env_parse("MAX_OUTPUT_BYTES", defaults.max_output_bytes)
                    .clamp(1024, 4 * 1024 * 1024),
                memory_mb: env_parse("SANDBOX_MEMORY_MB", defaults.memory_mb).clamp(32, 8192),
                cpus: env_parse("SANDBOX_CPUS", defaults.cpus).clamp(0.1, 4.0),
                max_processes: env_parse("SANDBOX_PIDS", defaults.max_processes).clamp(1, 256),
                docker_bin: env::var("DOCKER_BIN").unwrap_or(defaults.docker_bin),
                work_dir: env::var("WORK_DIR").ok().map(PathBuf::from),
            },
            max_code_bytes: env_parse("MAX_CODE_BYTES", 256 * 1024usize),
            api_keys: parse_api_keys(
                &env::var("API_KEYS").unwrap_or_else(|_| "dev-user:dev-key".to_string()),
            ),
            problems_path: env::var("PROBLEMS_PATH").ok().map(PathBuf::from),
            languages_path: env::var("LANGUAGES_PATH").ok().map(PathBuf::from),
            persistence_path: env::var("PERSIST_RESULTS_PATH").ok().map(PathBuf::from),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SandboxBackendKind {
    #[default]
    Docker,
    Process,
}

impl FromStr for SandboxBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "process" => Ok(Self::Process),
            _ => Err(format!("unsupported sandbox backend: {s}")),
        }
    }
}

/// Parses `user:key` pairs separated by commas.
fn parse_api_keys(input: &str) -> HashMap<String, String> {
    let mut keys = HashMap::new();
    for raw in input.split(',') {
        let entry = raw.trim();
        if entry.is_empty() {
            continue;
        }
        if let Some((user, key)) = entry.split_once(':') {
            let (user, key) = (user.trim(), key.trim());
            if !user.is_empty() && !key.is_empty() {
                keys.insert(key.to_string(), user.to_string());
            }
        }
    }
    if keys.is_empty() {
        keys.insert("dev-key".to_string(), "dev-user".to_string());
    }
    keys
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
