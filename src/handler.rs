use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{AppConfig, TimeoutConfig};
use crate::knowledge_base::{BedrockKnowledgeBase, GenerationError, GenerationService};
use crate::models::{ChatEnvelope, ChatQuery, ErrorBody, FailureBody, GenerationRequest};
use crate::presign::{S3Presigner, UrlSigner};
use crate::references::{enrich_references, extract_references};

/// Headers attached to every response so the widget can call us cross-origin.
pub const CORS_HEADERS: [(&str, &str); 4] = [
    (
        "Access-Control-Allow-Headers",
        "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token",
    ),
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "OPTIONS,POST"),
    ("Content-Type", "application/json"),
];

const FAILURE_MESSAGE: &str = "An error occurred while processing your request.";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request event must be a JSON object")]
    InvalidEvent,
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),
    #[error("request body has an unexpected shape: {0}")]
    InvalidBody(String),
    #[error("user_query is required")]
    MissingQuery,
}

#[derive(Deserialize)]
struct RequestBody {
    #[serde(default)]
    user_query: Option<String>,
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
}

/// Reads the question out of either a raw invocation payload or a gateway
/// event whose `body` is a JSON string or an already decoded object.
pub fn parse_event(event: &Value) -> Result<ChatQuery, RequestError> {
    let Value::Object(fields) = event else {
        return Err(RequestError::InvalidEvent);
    };

    let body = match fields.get("body") {
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(RequestError::InvalidJson)?,
        Some(inner @ Value::Object(_)) => inner.clone(),
        Some(_) => {
            return Err(RequestError::InvalidBody(
                "body must be an object or a JSON string".to_string(),
            ))
        }
        None => event.clone(),
    };

    // Serde would otherwise accept an array as the struct in field order.
    if !body.is_object() {
        return Err(RequestError::InvalidBody(
            "body must be a JSON object".to_string(),
        ));
    }

    let body: RequestBody = serde_json::from_value(body)
        .map_err(|err| RequestError::InvalidBody(err.to_string()))?;

    let user_query = body
        .user_query
        .filter(|query| !query.trim().is_empty())
        .ok_or(RequestError::MissingQuery)?;

    Ok(ChatQuery {
        user_query,
        session_id: body.session_id.filter(|id| !id.is_empty()),
    })
}

#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl HandlerResponse {
    fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        let body = serde_json::to_value(body)
            .unwrap_or_else(|err| json!({ "error": format!("failed to encode response: {err}") }));
        Self { status, body }
    }

    pub fn ok(envelope: &ChatEnvelope) -> Self {
        Self::json(StatusCode::OK, envelope)
    }

    pub fn bad_request(err: &RequestError) -> Self {
        Self::json(
            StatusCode::BAD_REQUEST,
            &ErrorBody {
                error: format!("Error processing request: {err}"),
            },
        )
    }

    pub fn failure(session_id: Option<String>) -> Self {
        Self::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &FailureBody {
                error: "Failed to generate an answer from the knowledge base.".to_string(),
                generated_response: FAILURE_MESSAGE.to_string(),
                detailed_references: vec![],
                session_id,
            },
        )
    }

    /// Proxy-integration shape expected by an API gateway in front of the function.
    pub fn into_gateway_response(self) -> Value {
        let headers: serde_json::Map<String, Value> = CORS_HEADERS
            .iter()
            .map(|(name, value)| (name.to_string(), Value::from(*value)))
            .collect();

        json!({
            "statusCode": self.status.as_u16(),
            "headers": headers,
            "body": self.body.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct ChatHandler {
    generator: Arc<dyn GenerationService>,
    signer: Arc<dyn UrlSigner>,
    timeouts: TimeoutConfig,
}

impl ChatHandler {
    pub fn new(
        generator: Arc<dyn GenerationService>,
        signer: Arc<dyn UrlSigner>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            generator,
            signer,
            timeouts,
        }
    }

    /// Wires the handler to Bedrock and S3 using the ambient AWS credentials.
    pub async fn from_aws(config: &AppConfig) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let knowledge_base = BedrockKnowledgeBase::new(
            aws_sdk_bedrockagentruntime::Client::new(&sdk_config),
            config.knowledge_base.clone(),
        );
        let presigner = S3Presigner::new(aws_sdk_s3::Client::new(&sdk_config));

        Self::new(
            Arc::new(knowledge_base),
            Arc::new(presigner),
            config.timeouts.clone(),
        )
    }

    pub async fn handle(&self, event: &Value) -> HandlerResponse {
        let request_id = Uuid::new_v4();
        tracing::debug!(%request_id, "received event: {event}");

        let query = match parse_event(event) {
            Ok(query) => query,
            Err(err) => {
                tracing::warn!(%request_id, "rejecting request: {err}");
                return HandlerResponse::bad_request(&err);
            }
        };

        let session_id = query.session_id.clone();
        match self.answer(query).await {
            Ok(envelope) => {
                tracing::info!(
                    %request_id,
                    sources = envelope.source_count,
                    "answered question"
                );
                HandlerResponse::ok(&envelope)
            }
            Err(err) => {
                tracing::error!(%request_id, "knowledge base request failed: {err}");
                HandlerResponse::failure(session_id)
            }
        }
    }

    pub async fn answer(&self, query: ChatQuery) -> Result<ChatEnvelope, GenerationError> {
        let request = GenerationRequest {
            query: query.user_query,
            session_id: query.session_id.clone(),
        };

        let generation = tokio::time::timeout(
            self.timeouts.generation,
            self.generator.retrieve_and_generate(request),
        )
        .await
        .map_err(|_| GenerationError::Timeout(self.timeouts.generation))??;

        let references = extract_references(&generation.citations);
        let cited = references.len();

        let issued_at = Utc::now();
        let detailed_references =
            enrich_references(self.signer.as_ref(), references, self.timeouts.link_ttl).await;
        if detailed_references.len() < cited {
            tracing::warn!(
                cited,
                linked = detailed_references.len(),
                "some cited sources have no download link"
            );
        }

        Ok(ChatEnvelope {
            generated_response: generation.text,
            source_count: detailed_references.len(),
            detailed_references,
            url_expiration_time: issued_at + link_ttl_delta(self.timeouts.link_ttl),
            session_id: generation.session_id.or(query.session_id),
        })
    }
}

fn link_ttl_delta(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1))
}
