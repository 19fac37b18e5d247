//! Schema labeling collaborator.
//!
//! A labeling service receives a [`SchemaDigest`] (structure only, never row
//! data) and answers with display names, column formats and profile layouts.
//! Labeling is optional: [`annotate_schema`] never fails the caller.

use crate::error::{DbError, DbResult};
use crate::models::{SchemaAnnotations, SchemaDigest, SchemaMetadata};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Something that can label a schema digest.
pub trait SchemaAnnotator: Send + Sync {
    /// True when a credential is configured, so requests need not carry one.
    fn has_api_key(&self) -> bool {
        false
    }

    /// Label the digest. `api_key` is the caller's credential, if any.
    fn annotate(
        &self,
        digest: &SchemaDigest,
        api_key: Option<&str>,
    ) -> impl Future<Output = DbResult<SchemaAnnotations>> + Send;
}

/// Labeling service reached over HTTP. The digest is POSTed as JSON and the
/// response body is parsed as [`SchemaAnnotations`].
#[derive(Clone)]
pub struct HttpAnnotator {
    url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpAnnotator {
    pub fn new(url: impl Into<String>) -> DbResult<Self> {
        let url = url.into();
        url::Url::parse(&url)
            .map_err(|e| DbError::validation(format!("Invalid annotator URL '{}': {}", url, e)))?;

        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| DbError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            api_key: None,
            http_client,
        })
    }

    /// Key used when the request carries none.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn headers(&self, api_key: Option<&str>) -> DbResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.or(self.api_key.as_deref()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key))
                    .map_err(|_| DbError::validation("Invalid API key format"))?,
            );
        }
        Ok(headers)
    }
}

impl std::fmt::Debug for HttpAnnotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAnnotator")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl SchemaAnnotator for HttpAnnotator {
    fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn annotate(
        &self,
        digest: &SchemaDigest,
        api_key: Option<&str>,
    ) -> DbResult<SchemaAnnotations> {
        let response = self
            .http_client
            .post(&self.url)
            .headers(self.headers(api_key)?)
            .json(digest)
            .send()
            .await
            .map_err(|e| DbError::annotation(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DbError::annotation(format!(
                "Service returned {}: {}",
                status, body
            )));
        }

        response
            .json::<SchemaAnnotations>()
            .await
            .map_err(|e| DbError::annotation(format!("Failed to parse response: {}", e)))
    }
}

/// Label a schema, giving up after `timeout`.
///
/// Returns `None` on error or timeout. The returned relationships are always
/// the detected ones from `metadata`.
pub async fn annotate_schema<A: SchemaAnnotator>(
    annotator: &A,
    metadata: &SchemaMetadata,
    api_key: Option<&str>,
    timeout: Duration,
) -> Option<SchemaAnnotations> {
    let digest = SchemaDigest::from_metadata(metadata);
    info!(
        tables = digest.tables.len(),
        relationships = digest.relationships.len(),
        "Starting schema annotation"
    );

    let start = Instant::now();
    match tokio::time::timeout(timeout, annotator.annotate(&digest, api_key)).await {
        Ok(Ok(annotations)) => {
            info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Schema annotation completed"
            );
            Some(annotations.with_detected_relationships(metadata))
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Schema annotation failed, continuing without it");
            None
        }
        Err(_) => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "Schema annotation timed out, continuing without it"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Relationship, RelationshipType, Table};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        calls: AtomicUsize,
        result: fn() -> DbResult<SchemaAnnotations>,
        delay: Duration,
    }

    impl SchemaAnnotator for Fixed {
        async fn annotate(
            &self,
            _digest: &SchemaDigest,
            _api_key: Option<&str>,
        ) -> DbResult<SchemaAnnotations> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            (self.result)()
        }
    }

    fn metadata() -> SchemaMetadata {
        SchemaMetadata {
            schemas: vec!["sales".to_string()],
            tables: vec![
                Table::new("orders").with_schema("sales"),
                Table::new("customers").with_schema("sales"),
            ],
            relationships: vec![Relationship {
                from_table: "orders".to_string(),
                from_schema: Some("sales".to_string()),
                from_column: "customer_id".to_string(),
                to_table: "customers".to_string(),
                to_schema: Some("sales".to_string()),
                to_column: "id".to_string(),
                constraint_name: "FK_orders_customers".to_string(),
                relationship_type: RelationshipType::OneToMany,
            }],
        }
    }

    fn labeled() -> DbResult<SchemaAnnotations> {
        let mut a = SchemaAnnotations::default();
        a.friendly_names
            .insert("sales.orders".to_string(), "Orders".to_string());
        Ok(a)
    }

    #[tokio::test]
    async fn test_success_uses_detected_relationships() {
        let annotator = Fixed {
            calls: AtomicUsize::new(0),
            result: labeled,
            delay: Duration::ZERO,
        };
        let meta = metadata();
        let result = annotate_schema(&annotator, &meta, Some("k"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.friendly_name("sales.orders"), Some("Orders"));
        assert_eq!(result.relationships, meta.relationships);
        assert_eq!(annotator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_yields_none() {
        let annotator = Fixed {
            calls: AtomicUsize::new(0),
            result: || Err(DbError::annotation("boom")),
            delay: Duration::ZERO,
        };
        assert!(
            annotate_schema(&annotator, &metadata(), None, Duration::from_secs(5))
                .await
                .is_none()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_none() {
        let annotator = Fixed {
            calls: AtomicUsize::new(0),
            result: labeled,
            delay: Duration::from_secs(600),
        };
        assert!(
            annotate_schema(&annotator, &metadata(), None, Duration::from_secs(180))
                .await
                .is_none()
        );
    }

    #[test]
    fn test_http_annotator_rejects_bad_url() {
        assert!(HttpAnnotator::new("not a url").is_err());
        assert!(HttpAnnotator::new("http://localhost:8080/annotate").is_ok());
    }

    #[test]
    fn test_request_key_overrides_configured_key() {
        let annotator = HttpAnnotator::new("http://localhost/a")
            .unwrap()
            .with_api_key("configured");
        let headers = annotator.headers(Some("per-request")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer per-request");
        let headers = annotator.headers(None).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer configured");
        assert!(!format!("{:?}", annotator).contains("configured"));
    }
}
