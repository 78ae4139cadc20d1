//! Search Service Module
//!
//! The core component responsible for answering queries against the vector index.
//!
//! ## Overview
//! This module bridges the HTTP API layer with the two read-only artifacts
//! (vector index and metadata store). Both are loaded lazily, exactly once,
//! and shared by every request afterwards.
//!
//! ## Responsibilities
//! - **Loading**: Double-checked lazy initialisation of the index and metadata.
//! - **Ranking**: k-NN over the normalised query vector.
//! - **Retrieval**: Hydrating hit ids with document metadata and snippets.
//! - **API**: Exposing search and readiness via HTTP endpoints.
//!
//! ## Submodules
//! - **`handlers`**: HTTP request handlers for the Axum web server.
//! - **`lazy`**: The load-once cell used for both artifacts.
//! - **`service`**: `SearchService` and background warmup.
//! - **`types`**: Results, settings, and Data Transfer Objects (DTOs).

pub mod handlers;
pub mod lazy;
pub mod service;
pub mod types;

pub use service::{SearchService, spawn_warmup};
pub use types::{MAX_TOP_K, Readiness, SearchResult, SearchSettings};

#[cfg(test)]
mod tests;
