use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("storage uri could not be split into bucket and key: {0}")]
    InvalidUri(String),
    #[error("invalid link expiration {0:?}: {1}")]
    Expiration(Duration, String),
    #[error("failed to presign s3://{bucket}/{key}: {message}")]
    Signing {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Mints time-limited download links for private storage objects.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn presign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, LinkError>;
}

#[derive(Clone)]
pub struct S3Presigner {
    client: aws_sdk_s3::Client,
}

impl S3Presigner {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UrlSigner for S3Presigner {
    async fn presign(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, LinkError> {
        if bucket.is_empty() || key.is_empty() {
            return Err(LinkError::InvalidUri(format!("s3://{bucket}/{key}")));
        }

        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|err| LinkError::Expiration(ttl, err.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .response_content_disposition("inline")
            .presigned(presigning)
            .await
            .map_err(|err| LinkError::Signing {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;

        Ok(request.uri().to_string())
    }
}
