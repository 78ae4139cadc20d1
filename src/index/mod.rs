//! Vector Index Module
//!
//! Read-only nearest-neighbour search over the corpus embeddings.
//!
//! ## Overview
//! The index artifact is produced offline and loaded once per process. Two
//! index layouts are supported, both scored by inner product (cosine
//! similarity for unit-length vectors):
//! - **Flat**: exact exhaustive scan.
//! - **IVF-Flat**: vectors partitioned into inverted lists around coarse
//!   centroids; a query only scans the `nprobe` lists whose centroids score
//!   highest. `nprobe` is the runtime search-quality knob.
//!
//! ## Submodules
//! - **`artifact`**: On-disk format, loading and validation.
//! - **`flat`**: Exact index.
//! - **`ivf`**: Partitioned approximate index.
//! - **`types`**: k-NN output and shared scoring helpers.

pub mod artifact;
pub mod flat;
pub mod ivf;
pub mod types;

pub use artifact::{IndexArtifact, load_index, save_index};
pub use flat::FlatIndex;
pub use ivf::IvfFlatIndex;
pub use types::{Neighbors, l2_normalize};

use crate::error::SearchError;

/// A loaded, immutable nearest-neighbour index.
///
/// Implementations must be safe to query from many threads at once.
pub trait VectorIndex: Send + Sync {
    /// Fixed dimensionality of every stored vector.
    fn dimension(&self) -> usize;

    /// Total number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns exactly `k` slots ordered by descending score. Slots without a
    /// genuine neighbour carry [`Neighbors::NO_RESULT`].
    ///
    /// # Errors
    /// `SearchError::DimensionMismatch` if `query.len() != self.dimension()`.
    fn knn(&self, query: &[f32], k: usize) -> Result<Neighbors, SearchError>;

    /// Current search-quality parameter, or `None` if this index type has none.
    fn search_quality(&self) -> Option<usize> {
        None
    }

    /// Sets the search-quality parameter. Returns `false` when the index
    /// type has no such parameter, in which case nothing changes.
    fn set_search_quality(&self, _value: usize) -> bool {
        false
    }
}
