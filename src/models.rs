use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of evidence returned by the knowledge base, bundling the
/// references that grounded one span of the generated answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    #[serde(default)]
    pub retrieved_references: Vec<RetrievedReference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievedReference {
    #[serde(default)]
    pub location: Option<ReferenceLocation>,
    #[serde(default)]
    pub content: Option<ReferenceContent>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl RetrievedReference {
    pub fn storage_uri(&self) -> Option<&str> {
        self.location
            .as_ref()?
            .s3_location
            .as_ref()?
            .uri
            .as_deref()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceLocation {
    #[serde(default)]
    pub s3_location: Option<S3Location>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct S3Location {
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReferenceContent {
    #[serde(default)]
    pub text: Option<String>,
}

/// One cited source after deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReference {
    pub uri: String,
    pub snippet: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedReference {
    #[serde(flatten)]
    pub source: SourceReference,
    pub presigned_url: String,
}

/// A validated inbound question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatQuery {
    pub user_query: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub generated_response: String,
    pub detailed_references: Vec<EnrichedReference>,
    #[serde(rename = "urlExpirationTime")]
    pub url_expiration_time: DateTime<Utc>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(rename = "sourceCount")]
    pub source_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Body sent back when the knowledge base call fails. The widget still
/// renders `generated_response`, so it carries a user-facing message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureBody {
    pub error: String,
    pub generated_response: String,
    pub detailed_references: Vec<EnrichedReference>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub query: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResult {
    pub text: String,
    pub citations: Vec<Citation>,
    pub session_id: Option<String>,
}
