use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Duration;

use crate::models::{Citation, EnrichedReference, SourceReference};
use crate::presign::{LinkError, UrlSigner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    pub bucket: String,
    pub key: String,
}

/// Collects the unique cited sources, best score first.
///
/// References are keyed by their storage URI and the first occurrence wins.
/// References without a storage location are skipped. The sort is stable, so
/// equal scores keep the order in which the knowledge base returned them.
pub fn extract_references(citations: &[Citation]) -> Vec<SourceReference> {
    let mut seen = HashSet::new();
    let mut references = Vec::new();

    for citation in citations {
        for reference in &citation.retrieved_references {
            let Some(uri) = reference.storage_uri() else {
                continue;
            };
            if !seen.insert(uri.to_string()) {
                continue;
            }

            let snippet = reference
                .content
                .as_ref()
                .and_then(|content| content.text.as_deref())
                .unwrap_or_default()
                .trim()
                .to_string();

            references.push(SourceReference {
                uri: uri.to_string(),
                snippet,
                score: reference.score.filter(|s| s.is_finite()).unwrap_or(0.0),
            });
        }
    }

    references.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    references
}

/// Splits a virtual-hosted style storage URI into bucket and key.
///
/// The bucket is the first label of the host and the key is the path without
/// its leading slashes, so `s3://docs.s3.amazonaws.com/a/b.pdf` yields
/// `docs` and `a/b.pdf`.
pub fn parse_storage_uri(uri: &str) -> Option<StorageObject> {
    let (_, rest) = uri.split_once("://")?;
    let rest = rest
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));

    let bucket = host.split('.').next().unwrap_or_default();
    let key = path.trim_start_matches('/');
    if bucket.is_empty() || key.is_empty() {
        return None;
    }

    Some(StorageObject {
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}

/// Attaches a presigned link to every reference that can be signed.
///
/// A reference whose link cannot be produced is dropped, never reported as a
/// request failure. Input order is preserved.
pub async fn enrich_references(
    signer: &dyn UrlSigner,
    references: Vec<SourceReference>,
    ttl: Duration,
) -> Vec<EnrichedReference> {
    let mut enriched = Vec::with_capacity(references.len());

    for source in references {
        let link = materialize(signer, &source.uri, ttl).await;
        match link {
            Ok(presigned_url) => enriched.push(EnrichedReference {
                source,
                presigned_url,
            }),
            Err(err) => {
                tracing::warn!(uri = %source.uri, "dropping reference without link: {err}");
            }
        }
    }

    enriched
}

async fn materialize(signer: &dyn UrlSigner, uri: &str, ttl: Duration) -> Result<String, LinkError> {
    let object = parse_storage_uri(uri).ok_or_else(|| LinkError::InvalidUri(uri.to_string()))?;
    let url = signer.presign(&object.bucket, &object.key, ttl).await?;
    if url.is_empty() {
        return Err(LinkError::Signing {
            bucket: object.bucket,
            key: object.key,
            message: "signer returned an empty url".to_string(),
        });
    }
    Ok(url)
}
