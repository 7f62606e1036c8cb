use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    modproxy::cli::run().await
}
