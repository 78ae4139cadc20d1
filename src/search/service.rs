//! Search Service
//!
//! Owns the vector index and the metadata store, loads each of them lazily
//! exactly once, and turns raw k-NN output into ranked, enriched results.
//!
//! ## Request path
//! 1. Clamp `top_k` into `[1, max_top_k]`.
//! 2. Load the index if needed and reject queries of the wrong dimension.
//! 3. Load the metadata if needed.
//! 4. Re-normalise the query and run k-NN.
//! 5. Drop sentinel ids and ids without metadata; renumber ranks densely.
//!
//! Once both artifacts are loaded a search takes no locks, so any number of
//! callers may run in parallel.

use super::lazy::Lazy;
use super::types::{Readiness, SearchResult, SearchSettings};
use crate::error::{LoadError, SearchError};
use crate::index::{self, VectorIndex, l2_normalize};
use crate::metadata::MetadataStore;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Produces the vector index on first use.
pub type IndexLoader = Box<dyn Fn() -> Result<Arc<dyn VectorIndex>, LoadError> + Send + Sync>;
/// Produces the metadata store on first use.
pub type MetadataLoader = Box<dyn Fn() -> Result<Arc<MetadataStore>, LoadError> + Send + Sync>;

pub struct SearchService {
    settings: SearchSettings,
    index: Lazy<dyn VectorIndex>,
    metadata: Lazy<MetadataStore>,
    index_loader: IndexLoader,
    metadata_loader: MetadataLoader,
}

impl SearchService {
    pub fn new(
        settings: SearchSettings,
        index_loader: IndexLoader,
        metadata_loader: MetadataLoader,
    ) -> Self {
        Self {
            settings,
            index: Lazy::new(),
            metadata: Lazy::new(),
            index_loader,
            metadata_loader,
        }
    }

    /// Service backed by an index artifact and a mapping file on disk.
    pub fn from_paths(
        settings: SearchSettings,
        index_path: impl Into<PathBuf>,
        mapping_path: impl Into<PathBuf>,
    ) -> Self {
        let index_path = index_path.into();
        let mapping_path = mapping_path.into();

        Self::new(
            settings,
            Box::new(move || {
                tracing::info!("[index] reading index: {}", index_path.display());
                index::load_index(&index_path)
            }),
            Box::new(move || MetadataStore::load(&mapping_path).map(Arc::new)),
        )
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Clamps a requested result count into `[1, max_top_k]`.
    pub fn clamp_top_k(&self, requested: usize) -> usize {
        requested.clamp(1, self.settings.max_top_k.max(1))
    }

    /// The vector index, loading it on first call.
    pub fn index(&self) -> Result<Arc<dyn VectorIndex>, LoadError> {
        self.index.get_or_try_load(|| {
            let index = (self.index_loader)()?;
            if let Some(nprobe) = self.settings.default_nprobe {
                apply_search_quality(index.as_ref(), nprobe);
            }
            Ok(index)
        })
    }

    /// The metadata store, loading it on first call.
    pub fn metadata(&self) -> Result<Arc<MetadataStore>, LoadError> {
        self.metadata.get_or_try_load(|| (self.metadata_loader)())
    }

    /// Changes the index's search-quality parameter, loading the index if needed.
    ///
    /// Returns `Ok(false)` when the loaded index type has no such parameter.
    pub fn set_search_quality(&self, value: usize) -> Result<bool, LoadError> {
        let index = self.index()?;
        Ok(apply_search_quality(index.as_ref(), value))
    }

    /// Top-`top_k` documents for `query`, best first.
    ///
    /// # Errors
    /// - `SearchError::Load` if an artifact cannot be loaded.
    /// - `SearchError::DimensionMismatch` if `query` does not match the index.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
        let k = self.clamp_top_k(top_k);

        let index = self.index()?;
        if query.len() != index.dimension() {
            return Err(SearchError::DimensionMismatch {
                expected: index.dimension(),
                actual: query.len(),
            });
        }
        let metadata = self.metadata()?;

        let query = l2_normalize(query);
        let neighbors = index.knn(&query, k)?;

        let mut results = Vec::with_capacity(neighbors.len());
        for (vector_id, score) in neighbors.iter() {
            let Some(record) = metadata.get(vector_id) else {
                tracing::trace!("dropping hit {}: no metadata", vector_id);
                continue;
            };
            results.push(SearchResult::from_record(
                results.len() + 1,
                vector_id,
                score,
                record,
                self.settings.snippet_chars,
            ));
        }

        Ok(results)
    }

    /// Loads metadata, then the index. Intended for startup warmup.
    pub fn warm_up(&self) -> Result<(), LoadError> {
        let started = Instant::now();
        let metadata = self.metadata()?;
        tracing::info!(
            "[startup] mapping loaded: {} records in {:.2}s",
            metadata.len(),
            started.elapsed().as_secs_f64()
        );

        let started = Instant::now();
        let index = self.index()?;
        tracing::info!(
            "[startup] index loaded: {} vectors in {:.2}s",
            index.len(),
            started.elapsed().as_secs_f64()
        );

        Ok(())
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            mapping_ready: self.metadata.is_loaded(),
            index_ready: self.index.is_loaded(),
        }
    }

    pub fn index_load_count(&self) -> usize {
        self.index.load_count()
    }

    pub fn metadata_load_count(&self) -> usize {
        self.metadata.load_count()
    }
}

fn apply_search_quality(index: &dyn VectorIndex, value: usize) -> bool {
    let applied = index.set_search_quality(value);
    if applied {
        tracing::info!(
            "[index] search quality set to {}",
            index.search_quality().unwrap_or(value)
        );
    } else {
        tracing::debug!("[index] search quality not supported by this index type; ignoring");
    }
    applied
}

/// Runs [`SearchService::warm_up`] on the blocking pool without waiting for it.
///
/// Failures are logged; requests arriving first load synchronously instead.
pub fn spawn_warmup(service: Arc<SearchService>) -> tokio::task::JoinHandle<()> {
    tracing::info!("[startup] starting background warmup...");

    tokio::task::spawn_blocking(move || {
        if let Err(e) = service.warm_up() {
            tracing::error!(
                "[startup] warmup failed for {}: {}",
                e.path().display(),
                e
            );
        }
    })
}
