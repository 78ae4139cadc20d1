//! Thesis Semantic Search Library
//!
//! This library crate defines the modules that make up the semantic search
//! service. It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`index`**: Read-only nearest-neighbour index over document embeddings
//!   (exact flat scan or partitioned IVF) and its on-disk artifact format.
//! - **`metadata`**: The document metadata store, joined to the index by vector-id.
//! - **`search`**: The search service. Lazily loads both artifacts exactly once,
//!   runs k-NN queries and assembles ranked results; also hosts the HTTP handlers.
//! - **`embedding`**: Client for the external text-to-vector provider.
//! - **`config`**: Environment-driven configuration.
//! - **`error`**: Typed errors shared by the core modules.

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod metadata;
pub mod search;
