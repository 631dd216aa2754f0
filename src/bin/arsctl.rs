#[tokio::main]
async fn main() -> anyhow::Result<()> {
    arsctl::run().await
}
