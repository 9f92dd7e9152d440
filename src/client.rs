use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;

use crate::models::{ChatEnvelope, ErrorBody};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct ChatPayload<'a> {
    user_query: &'a str,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
}

impl ChatClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub async fn ask(&self, question: &str, session_id: Option<&str>) -> Result<ChatEnvelope> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatPayload {
                user_query: question,
                session_id,
            })
            .send()
            .await
            .with_context(|| format!("failed to reach chat endpoint {}", self.endpoint))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read chat response body")?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|err| err.error)
                .unwrap_or(body);
            anyhow::bail!("chat endpoint returned {status}: {message}");
        }

        serde_json::from_str(&body).context("failed to decode chat response")
    }
}

/// Per-conversation state carried between turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub session_id: Option<String>,
}

impl ConversationContext {
    pub fn new(session_id: Option<String>) -> Self {
        Self { session_id }
    }

    pub async fn ask(&mut self, client: &ChatClient, question: &str) -> Result<ChatEnvelope> {
        let envelope = client.ask(question, self.session_id.as_deref()).await?;
        self.record(&envelope);
        Ok(envelope)
    }

    fn record(&mut self, envelope: &ChatEnvelope) {
        if let Some(session_id) = envelope.session_id.as_ref().filter(|id| !id.is_empty()) {
            self.session_id = Some(session_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::config::TimeoutConfig;
    use crate::handler::ChatHandler;
    use crate::knowledge_base::{GenerationError, GenerationService};
    use crate::models::{GenerationRequest, GenerationResult};
    use crate::presign::{LinkError, UrlSigner};
    use crate::server::router;

    #[derive(Default)]
    struct TurnCounter {
        seen_sessions: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl GenerationService for TurnCounter {
        async fn retrieve_and_generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResult, GenerationError> {
            let mut seen = self.seen_sessions.lock().unwrap();
            seen.push(request.session_id.clone());
            Ok(GenerationResult {
                text: format!("turn {}", seen.len()),
                citations: vec![],
                session_id: Some(
                    request
                        .session_id
                        .unwrap_or_else(|| "conversation-1".to_string()),
                ),
            })
        }
    }

    struct NoopSigner;

    #[async_trait]
    impl UrlSigner for NoopSigner {
        async fn presign(&self, bucket: &str, key: &str, _ttl: Duration) -> Result<String, LinkError> {
            Ok(format!("https://{bucket}/{key}"))
        }
    }

    async fn spawn_server(kb: Arc<TurnCounter>) -> String {
        let app = router(ChatHandler::new(
            kb,
            Arc::new(NoopSigner),
            TimeoutConfig {
                generation: Duration::from_secs(5),
                link_ttl: Duration::from_secs(3_600),
            },
        ));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/chat")
    }

    #[tokio::test]
    async fn conversation_carries_session_between_turns() {
        let kb = Arc::new(TurnCounter::default());
        let client = ChatClient::new(spawn_server(kb.clone()).await).unwrap();
        let mut conversation = ConversationContext::default();

        let first = conversation.ask(&client, "What is X?").await.unwrap();
        let second = conversation.ask(&client, "And Y?").await.unwrap();

        assert_eq!(first.generated_response, "turn 1");
        assert_eq!(second.generated_response, "turn 2");
        assert_eq!(conversation.session_id.as_deref(), Some("conversation-1"));
        assert_eq!(
            *kb.seen_sessions.lock().unwrap(),
            vec![None, Some("conversation-1".to_string())]
        );
    }

    #[tokio::test]
    async fn error_body_is_surfaced() {
        let kb = Arc::new(TurnCounter::default());
        let client = ChatClient::new(spawn_server(kb).await).unwrap();

        let err = client.ask("   ", None).await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("user_query is required"));
    }
}
