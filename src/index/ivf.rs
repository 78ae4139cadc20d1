//! Inverted-file index with flat (uncompressed) lists.
//!
//! Each stored vector lives in the list of the coarse centroid it scores
//! highest against. A query ranks the centroids, scans the top `nprobe`
//! lists exhaustively and merges the candidates. Raising `nprobe` trades
//! latency for recall; `nprobe == nlist` is equivalent to a flat scan.

use super::VectorIndex;
use super::types::{Neighbors, check_dimension, inner_product};
use crate::error::SearchError;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Vectors assigned to one centroid, with their global vector-ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedList {
    pub ids: Vec<i64>,
    /// Row-major, `ids.len() * dimension` floats.
    pub vectors: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IvfFlatIndex {
    dimension: usize,
    /// Row-major, `lists.len() * dimension` floats.
    centroids: Vec<f32>,
    lists: Vec<InvertedList>,
    /// Probe count stored with the artifact.
    default_nprobe: usize,
    /// Runtime override; 0 means "use `default_nprobe`".
    #[serde(skip)]
    nprobe: AtomicUsize,
}

impl IvfFlatIndex {
    /// Builds an index by assigning each row of `vectors` (vector-id = row
    /// number) to its highest-scoring centroid.
    ///
    /// Returns `None` if the dimension is zero, there are no centroids, or
    /// either buffer is not a whole number of rows.
    pub fn from_centroids(
        dimension: usize,
        centroids: Vec<f32>,
        vectors: &[f32],
        nprobe: usize,
    ) -> Option<Self> {
        if dimension == 0
            || centroids.is_empty()
            || centroids.len() % dimension != 0
            || vectors.len() % dimension != 0
        {
            return None;
        }

        let nlist = centroids.len() / dimension;
        let mut lists = vec![InvertedList::default(); nlist];

        for (id, vector) in vectors.chunks_exact(dimension).enumerate() {
            let list = nearest_centroid(&centroids, dimension, vector);
            lists[list].ids.push(id as i64);
            lists[list].vectors.extend_from_slice(vector);
        }

        Some(Self {
            dimension,
            centroids,
            lists,
            default_nprobe: nprobe.clamp(1, nlist),
            nprobe: AtomicUsize::new(0),
        })
    }

    /// Number of inverted lists (partitions).
    pub fn nlist(&self) -> usize {
        self.lists.len()
    }

    pub fn nprobe(&self) -> usize {
        match self.nprobe.load(Ordering::Relaxed) {
            0 => self.default_nprobe,
            n => n,
        }
    }

    pub(crate) fn centroids(&self) -> &[f32] {
        &self.centroids
    }

    pub(crate) fn lists(&self) -> &[InvertedList] {
        &self.lists
    }

    pub(crate) fn default_nprobe(&self) -> usize {
        self.default_nprobe
    }

    /// Indices of the `nprobe` best-scoring lists.
    fn select_probes(&self, query: &[f32], nprobe: usize) -> Vec<usize> {
        let scored: Vec<(i64, f32)> = self
            .centroids
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(list, centroid)| (list as i64, inner_product(query, centroid)))
            .collect();

        Neighbors::from_candidates(scored, nprobe)
            .ids
            .into_iter()
            .filter(|&list| list != Neighbors::NO_RESULT)
            .map(|list| list as usize)
            .collect()
    }
}

impl VectorIndex for IvfFlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.lists.iter().map(|list| list.ids.len()).sum()
    }

    fn knn(&self, query: &[f32], k: usize) -> Result<Neighbors, SearchError> {
        check_dimension(self.dimension, query)?;

        let probes = self.select_probes(query, self.nprobe());
        let candidates: Vec<(i64, f32)> = probes
            .par_iter()
            .flat_map_iter(|&list| {
                let list = &self.lists[list];
                list.ids
                    .iter()
                    .zip(list.vectors.chunks_exact(self.dimension))
                    .map(|(&id, vector)| (id, inner_product(query, vector)))
            })
            .collect();

        Ok(Neighbors::from_candidates(candidates, k))
    }

    fn search_quality(&self) -> Option<usize> {
        Some(self.nprobe())
    }

    /// Clamped to `[1, nlist]`.
    fn set_search_quality(&self, value: usize) -> bool {
        self.nprobe
            .store(value.clamp(1, self.nlist()), Ordering::Relaxed);
        true
    }
}

fn nearest_centroid(centroids: &[f32], dimension: usize, vector: &[f32]) -> usize {
    centroids
        .chunks_exact(dimension)
        .enumerate()
        .map(|(list, centroid)| (list, inner_product(vector, centroid)))
        .fold((0, f32::NEG_INFINITY), |best, (list, score)| {
            if score > best.1 { (list, score) } else { best }
        })
        .0
}
