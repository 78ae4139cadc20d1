use super::{Embedder, EmbeddingError};
use crate::index::l2_normalize;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    /// Base URL up to and excluding `/embeddings`, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    /// Requested and expected output dimensionality.
    pub dimensions: usize,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    config: EmbedderConfig,
    url: String,
    http_client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(config: EmbedderConfig) -> Self {
        let url = format!("{}/embeddings", config.api_base.trim_end_matches('/'));
        Self {
            config,
            url,
            http_client: reqwest::Client::new(),
        }
    }

    /// POSTs `payload`, retrying transport failures, 429 and 5xx responses
    /// with exponential backoff plus jitter.
    async fn post_with_retry<T: Serialize>(
        &self,
        payload: &T,
    ) -> Result<reqwest::Response, EmbeddingError> {
        let attempts = self.config.max_retries + 1;
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let last = attempt + 1 == attempts;
            let response = self
                .http_client
                .post(&self.url)
                .bearer_auth(&self.config.api_key)
                .json(payload)
                .timeout(self.config.timeout)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if is_retryable(resp.status()) && !last => {
                    tracing::warn!(
                        "[embed] attempt {}/{} got {}; retrying",
                        attempt + 1,
                        attempts,
                        resp.status()
                    );
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(EmbeddingError::Status { status, body });
                }
                Err(e) if !last => {
                    tracing::warn!(
                        "[embed] attempt {}/{} failed: {}; retrying",
                        attempt + 1,
                        attempts,
                        e
                    );
                }
                Err(e) => return Err(EmbeddingError::Transport(e)),
            }

            let jitter = rand::random::<u64>() % 50;
            tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
            delay_ms = (delay_ms * 2).min(1200);
        }

        Err(EmbeddingError::InvalidResponse(
            "retry attempts exhausted".to_string(),
        ))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: [text],
            dimensions: self.config.dimensions,
        };

        let response = self.post_with_retry(&request).await?;
        let body = response.bytes().await?;
        let parsed: EmbeddingResponse = serde_json::from_slice(&body)
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))?;

        if embedding.len() != self.config.dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.config.dimensions,
                actual: embedding.len(),
            });
        }

        Ok(l2_normalize(&embedding))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
