//! Query Embedding Module
//!
//! Turns query text into a unit-length vector by calling an external
//! embedding provider. The search core only sees the resulting vector.
//!
//! ## Submodules
//! - **`client`**: HTTP client for OpenAI-compatible `/embeddings` endpoints.

pub mod client;

pub use client::{EmbedderConfig, HttpEmbedder};

use async_trait::async_trait;

/// Text-to-vector boundary used by the HTTP layer.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds `text` and returns an L2-normalised vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// The embedding provider could not produce a usable vector.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("embedding provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}
