use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// S3 refuses presigned URLs that live longer than a week.
const MAX_LINK_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Upper limit Bedrock accepts for `numberOfResults`.
const MAX_NUMBER_OF_RESULTS: u64 = 100;

#[derive(Clone, Debug)]
pub struct KnowledgeBaseConfig {
    pub knowledge_base_id: String,
    pub model_arn: String,
    pub number_of_results: usize,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Clone, Debug)]
pub struct TimeoutConfig {
    pub generation: Duration,
    pub link_ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub knowledge_base: KnowledgeBaseConfig,
    pub timeouts: TimeoutConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("missing required environment variable {key}"))
        };
        let parsed = |key: &str, default: u64| -> Result<u64> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{key} must be a whole number, got {raw:?}")),
                None => Ok(default),
            }
        };

        let link_ttl_secs = parsed("PRESIGNED_URL_TTL_SECS", 3_600)?;
        if link_ttl_secs == 0 || link_ttl_secs > MAX_LINK_TTL_SECS {
            anyhow::bail!(
                "PRESIGNED_URL_TTL_SECS must be between 1 and {MAX_LINK_TTL_SECS}, got {link_ttl_secs}"
            );
        }

        let number_of_results = parsed("KB_NUMBER_OF_RESULTS", 3)?;
        if number_of_results == 0 || number_of_results > MAX_NUMBER_OF_RESULTS {
            anyhow::bail!(
                "KB_NUMBER_OF_RESULTS must be between 1 and {MAX_NUMBER_OF_RESULTS}, got {number_of_results}"
            );
        }

        let generation_secs = parsed("GENERATION_TIMEOUT_SECS", 30)?;
        if generation_secs == 0 {
            anyhow::bail!("GENERATION_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Self {
            bind_addr: lookup("KB_CHAT_BIND").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            knowledge_base: KnowledgeBaseConfig {
                knowledge_base_id: required("KNOWLEDGE_BASE_ID")?,
                model_arn: required("FM_ARN")?,
                number_of_results: number_of_results as usize,
                temperature: 0.0,
                top_p: 0.9,
            },
            timeouts: TimeoutConfig {
                generation: Duration::from_secs(generation_secs),
                link_ttl: Duration::from_secs(link_ttl_secs),
            },
        })
    }
}
