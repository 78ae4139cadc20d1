//! Exact inner-product index.

use super::VectorIndex;
use super::types::{Neighbors, check_dimension, inner_product};
use crate::error::SearchError;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Exhaustive index: every query scores every stored vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    /// Row-major, `len() * dimension` floats. Row `i` is vector-id `i`.
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Builds an index from row-major vector data.
    ///
    /// Returns `None` if `dimension` is zero or `vectors` is not a whole number of rows.
    pub fn new(dimension: usize, vectors: Vec<f32>) -> Option<Self> {
        if dimension == 0 || vectors.len() % dimension != 0 {
            return None;
        }
        Some(Self { dimension, vectors })
    }

    pub(crate) fn vectors(&self) -> &[f32] {
        &self.vectors
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    fn knn(&self, query: &[f32], k: usize) -> Result<Neighbors, SearchError> {
        check_dimension(self.dimension, query)?;

        let candidates: Vec<(i64, f32)> = self
            .vectors
            .par_chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, vector)| (id as i64, inner_product(query, vector)))
            .collect();

        Ok(Neighbors::from_candidates(candidates, k))
    }
}
