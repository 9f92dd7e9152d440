use std::net::SocketAddr;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::handler::{ChatHandler, HandlerResponse, RequestError, CORS_HEADERS};

pub fn router(handler: ChatHandler) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler).options(preflight))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

pub async fn run_server(config: AppConfig, handler: ChatHandler) -> Result<()> {
    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(handler)).await?;
    Ok(())
}

async fn chat_handler(State(handler): State<ChatHandler>, body: Bytes) -> HandlerResponse {
    let event = match serde_json::from_slice::<Value>(&body) {
        Ok(event) => event,
        Err(err) => return HandlerResponse::bad_request(&RequestError::InvalidJson(err)),
    };

    handler.handle(&event).await
}

async fn preflight() -> HandlerResponse {
    HandlerResponse {
        status: StatusCode::OK,
        body: json!({}),
    }
}

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body.to_string()).into_response();

        let headers = response.headers_mut();
        for (name, value) in CORS_HEADERS {
            if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                headers.insert(name, HeaderValue::from_static(value));
            }
        }

        response
    }
}
