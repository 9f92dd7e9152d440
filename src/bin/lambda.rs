use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use kb_chat::{AppConfig, ChatHandler};

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let handler = ChatHandler::from_aws(&config).await;

    run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = handler.clone();
        async move {
            let response = handler.handle(&event.payload).await;
            Ok::<Value, Error>(response.into_gateway_response())
        }
    }))
    .await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .without_time()
        .init();
}
