#[tokio::main]
async fn main() -> anyhow::Result<()> {
    judge_engine::engine::run().await
}
