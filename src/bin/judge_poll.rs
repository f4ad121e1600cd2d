//! Submits a source file to a running judge and polls until a verdict.

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context;
use clap::Parser;
use judge_engine::{
    client::{DEFAULT_POLL_INTERVAL, JudgeClient},
    engine::models::SubmissionStatus,
};

#[derive(Parser)]
#[command(name = "judge-poll", about = "Submit code to the judge and wait for the verdict")]
struct Cli {
    /// Problem to judge against
    problem_id: String,

    /// Language key, e.g. python or javascript
    language: String,

    /// Source file to submit
    file: PathBuf,

    #[arg(long, env = "JUDGE_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    #[arg(long, env = "JUDGE_API_KEY", default_value = "dev-key")]
    api_key: String,

    /// Milliseconds between status checks
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    interval_ms: u64,

    /// Stop polling after this many seconds
    #[arg(long)]
    give_up_after: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let code = tokio::fs::read_to_string(&cli.file)
        .await
        .with_context(|| format!("failed to read {}", cli.file.display()))?;

    let client = JudgeClient::new(cli.url, cli.api_key);
    let created = client
        .create(&cli.problem_id, &cli.language, &code)
        .await
        .context("submission rejected")?;
    println!("submitted {} ({})", created.id, created.status);

    let done = client
        .poll_until_terminal(
            created.id,
            Duration::from_millis(cli.interval_ms),
            cli.give_up_after.map(Duration::from_secs),
        )
        .await?;

    println!("{}", done.status);
    if !done.output.is_empty() {
        println!("{}", done.output);
    }
    Ok(if done.status == SubmissionStatus::Accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
