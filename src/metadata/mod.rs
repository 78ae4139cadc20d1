//! Metadata Store Module
//!
//! Holds the document metadata that accompanies every vector in the index.
//!
//! ## Overview
//! The mapping file is line-delimited JSON written by the offline indexing
//! pipeline, one object per indexed chunk, in the same order the vectors were
//! added to the index. The n-th successfully parsed record therefore belongs to
//! vector-id `n`.
//!
//! ## Submodules
//! - **`store`**: Loading the mapping file and id-based lookup.
//! - **`types`**: The `DocumentRecord` type and per-line parsing.

pub mod store;
pub mod types;

pub use store::MetadataStore;
pub use types::{Authors, DocumentRecord, IntOrText, MalformedRecord};
