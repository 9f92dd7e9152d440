use anyhow::Result;
use tracing_subscriber::EnvFilter;

use kb_chat::{run_server, AppConfig, ChatHandler};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let handler = ChatHandler::from_aws(&config).await;

    run_server(config, handler).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
