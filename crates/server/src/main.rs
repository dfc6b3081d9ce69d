#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kbase_server::start().await
}
