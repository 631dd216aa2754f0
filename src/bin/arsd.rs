#[tokio::main]
async fn main() -> anyhow::Result<()> {
    audio_research_daemon::run().await
}
