use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    xgrab_cli::run().await
}
