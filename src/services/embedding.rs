//! Embedding provider seam and HTTP client implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;

/// Produces one fixed-dimension vector per input text, order-preserving.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Request body for the /embed endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest {
    inputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<bool>,
}

/// Response from the /embed endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse(Vec<Vec<f32>>);

/// Embedding provider backed by an HTTP embedding server.
///
/// Timeouts, connection failures, and 429/5xx responses are classified as
/// transient; everything else is fatal. Retry policy is applied by the
/// caller, not here.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingProvider {
    client: Client,
    base_url: String,
}

/// Pull the server's error detail out of a JSON error body, falling back to
/// the raw body for non-JSON responses.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|detail| detail.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

impl HttpEmbeddingProvider {
    /// Create a new embedding client with the given configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Fatal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL of the embedding server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let url = format!("{}/embed", self.base_url);
        let request = EmbedRequest {
            inputs: texts,
            truncate: Some(true),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Transient("embedding request timed out".to_string())
                } else if e.is_connect() {
                    EmbeddingError::Transient(format!("connection failed: {}", e))
                } else {
                    EmbeddingError::Fatal(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("status {}: {}", status, error_detail(&body));
            // Rate limiting and server-side failures are worth retrying.
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(EmbeddingError::Transient(message));
            }
            return Err(EmbeddingError::Fatal(message));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Fatal(format!("invalid embedding response: {}", e)))?;

        // A partial batch is indistinguishable from data corruption here;
        // surface it as fatal rather than silently misaligning chunks.
        if embed_response.0.len() != expected {
            return Err(EmbeddingError::Fatal(format!(
                "embedding server returned {} vectors for {} inputs",
                embed_response.0.len(),
                expected
            )));
        }

        Ok(embed_response.0)
    }
}
