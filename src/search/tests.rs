//! Search Module Tests
//!
//! Validates the search service end to end with scripted and real indexes.
//!
//! ## Test Scopes
//! - **Result assembly**: Sentinel and unknown ids dropped, ranks renumbered, snippets.
//! - **top_k**: Clamping into `[1, 50]`.
//! - **Loading**: Exactly-once loads under concurrency, retry after failure, readiness.
//! - **Handlers**: HTTP status codes and payloads.

#[cfg(test)]
mod tests {
    use crate::embedding::{Embedder, EmbeddingError};
    use crate::error::{LoadError, SearchError};
    use crate::index::{
        FlatIndex, IndexArtifact, IvfFlatIndex, Neighbors, VectorIndex, save_index,
    };
    use crate::metadata::MetadataStore;
    use crate::search::handlers::{handle_healthz, handle_ready, handle_search};
    use crate::search::lazy::Lazy;
    use crate::search::service::{IndexLoader, MetadataLoader, SearchService, spawn_warmup};
    use crate::search::types::{SearchRequest, SearchSettings};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::{Extension, Json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Index that returns a fixed k-NN answer and records what it was asked.
    struct ScriptedIndex {
        dimension: usize,
        answer: Neighbors,
        last_k: AtomicUsize,
        last_query: Mutex<Vec<f32>>,
    }

    impl ScriptedIndex {
        fn new(dimension: usize, ids: Vec<i64>, scores: Vec<f32>) -> Arc<Self> {
            Arc::new(Self {
                dimension,
                answer: Neighbors { ids, scores },
                last_k: AtomicUsize::new(0),
                last_query: Mutex::new(Vec::new()),
            })
        }
    }

    impl VectorIndex for ScriptedIndex {
        fn dimension(&self) -> usize {
            self.dimension
        }

        fn len(&self) -> usize {
            self.answer.len()
        }

        fn knn(&self, query: &[f32], k: usize) -> Result<Neighbors, SearchError> {
            self.last_k.store(k, Ordering::SeqCst);
            *self.last_query.lock().unwrap() = query.to_vec();
            Ok(self.answer.clone())
        }
    }

    fn mapping(lines: &str) -> Arc<MetadataStore> {
        Arc::new(MetadataStore::from_reader(lines.as_bytes(), "inline").unwrap())
    }

    fn three_records() -> Arc<MetadataStore> {
        mapping(concat!(
            "{\"titulo\":\"cero\",\"texto\":\"primero\"}\n",
            "{\"titulo\":\"uno\"}\n",
            "{\"titulo\":\"dos\",\"autores\":[\"Ana\"],\"anio_publicacion\":2020}\n",
        ))
    }

    fn service_with(index: Arc<dyn VectorIndex>, metadata: Arc<MetadataStore>) -> SearchService {
        SearchService::new(
            SearchSettings::default(),
            Box::new(move || Ok(index.clone())),
            Box::new(move || Ok(metadata.clone())),
        )
    }

    /// 2-D flat index with `n` vectors spread around the unit circle.
    fn circle_index(n: usize) -> FlatIndex {
        let mut vectors = Vec::with_capacity(n * 2);
        for i in 0..n {
            let angle = i as f32 * std::f32::consts::TAU / n as f32;
            vectors.push(angle.cos());
            vectors.push(angle.sin());
        }
        FlatIndex::new(2, vectors).unwrap()
    }

    fn empty_records(n: usize) -> Arc<MetadataStore> {
        mapping(&"{}\n".repeat(n))
    }

    // ============================================================
    // RESULT ASSEMBLY
    // ============================================================

    #[test]
    fn test_sentinel_dropped_and_ranks_renumbered() {
        let index = ScriptedIndex::new(2, vec![2, -1, 0], vec![0.9, 0.1, 0.5]);
        let service = service_with(index, three_records());

        let results = service.search(&[1.0, 0.0], 3).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].vector_id, 2);
        assert_eq!(results[0].score, 0.9);
        assert_eq!(results[0].title.as_deref(), Some("dos"));
        assert_eq!(results[1].rank, 2);
        assert_eq!(results[1].vector_id, 0);
        assert_eq!(results[1].score, 0.5);
    }

    #[test]
    fn test_ids_without_metadata_are_dropped() {
        let index = ScriptedIndex::new(2, vec![7, 1, 3, 0], vec![0.9, 0.8, 0.7, 0.6]);
        let service = service_with(index, three_records());

        let results = service.search(&[1.0, 0.0], 4).unwrap();

        let ids: Vec<i64> = results.iter().map(|r| r.vector_id).collect();
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ids, vec![1, 0]);
        assert_eq!(ranks, vec![1, 2]);
    }

    #[test]
    fn test_equal_scores_keep_index_order() {
        let index = ScriptedIndex::new(2, vec![2, 0, 1], vec![0.5, 0.5, 0.5]);
        let service = service_with(index, three_records());

        let results = service.search(&[1.0, 0.0], 3).unwrap();

        let ids: Vec<i64> = results.iter().map(|r| r.vector_id).collect();
        assert_eq!(ids, vec![2, 0, 1]);
    }

    #[test]
    fn test_snippet_truncated_to_configured_length() {
        let text = "a".repeat(1000);
        let metadata = mapping(&format!("{{\"texto\":\"{}\"}}\n{{}}\n", text));
        let index = ScriptedIndex::new(2, vec![0, 1], vec![0.9, 0.8]);
        let service = service_with(index, metadata);

        let results = service.search(&[1.0, 0.0], 2).unwrap();

        assert_eq!(results[0].snippet.chars().count(), 300);
        assert_eq!(results[1].snippet, "");
    }

    #[test]
    fn test_result_carries_record_fields() {
        let index = ScriptedIndex::new(2, vec![2], vec![0.9]);
        let service = service_with(index, three_records());

        let results = service.search(&[1.0, 0.0], 1).unwrap();
        let json = serde_json::to_value(&results[0]).unwrap();

        assert_eq!(json["rank"], 1);
        assert_eq!(json["vector_id"], 2);
        assert_eq!(json["titulo"], "dos");
        assert_eq!(json["autores"][0], "Ana");
        assert_eq!(json["anio_publicacion"], 2020);
        assert!(json["pdf_url"].is_null());
        assert_eq!(json["snippet"], "");
    }

    #[test]
    fn test_query_is_normalized_before_knn() {
        let index = ScriptedIndex::new(2, vec![0], vec![1.0]);
        let service = service_with(index.clone(), three_records());

        service.search(&[3.0, 4.0], 1).unwrap();

        let seen = index.last_query.lock().unwrap().clone();
        assert!((seen[0] - 0.6).abs() < 1e-6);
        assert!((seen[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_results_bounded_dense_and_sorted() {
        let service = service_with(Arc::new(circle_index(80)), empty_records(80));

        for top_k in [1, 2, 7, 25, 50] {
            let results = service.search(&[0.3, 0.7], top_k).unwrap();

            assert_eq!(results.len(), top_k);
            for (i, result) in results.iter().enumerate() {
                assert_eq!(result.rank, i + 1);
            }
            assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[test]
    fn test_small_corpus_returns_fewer_results() {
        let service = service_with(Arc::new(circle_index(3)), empty_records(3));

        let results = service.search(&[1.0, 0.0], 10).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].vector_id, 0);
    }

    // ============================================================
    // TOP_K CLAMPING
    // ============================================================

    #[test]
    fn test_top_k_is_clamped() {
        let index = ScriptedIndex::new(2, vec![0], vec![1.0]);
        let service = service_with(index.clone(), three_records());

        service.search(&[1.0, 0.0], 0).unwrap();
        assert_eq!(index.last_k.load(Ordering::SeqCst), 1);

        service.search(&[1.0, 0.0], 9999).unwrap();
        assert_eq!(index.last_k.load(Ordering::SeqCst), 50);

        assert_eq!(service.clamp_top_k(17), 17);
    }

    // ============================================================
    // ERRORS
    // ============================================================

    #[test]
    fn test_dimension_mismatch_is_rejected_before_metadata_load() {
        let service = service_with(Arc::new(circle_index(4)), empty_records(4));

        let err = service.search(&[1.0, 0.0, 0.0], 3).unwrap_err();

        assert!(matches!(
            err,
            SearchError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert!(err.is_client_error());
        assert_eq!(service.metadata_load_count(), 0);
    }

    #[test]
    fn test_failed_load_is_retried_on_next_call() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let index_loader: IndexLoader = Box::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LoadError::corrupt("/tmp/index.bin", "simulated"))
            } else {
                Ok(Arc::new(circle_index(4)) as Arc<dyn VectorIndex>)
            }
        });
        let metadata = empty_records(4);
        let metadata_loader: MetadataLoader = Box::new(move || Ok(metadata.clone()));
        let service = SearchService::new(SearchSettings::default(), index_loader, metadata_loader);

        let err = service.search(&[1.0, 0.0], 2).unwrap_err();
        assert!(matches!(err, SearchError::Load(LoadError::Corrupt { .. })));
        assert!(!err.is_client_error());
        assert!(!service.readiness().index_ready);

        assert_eq!(service.search(&[1.0, 0.0], 2).unwrap().len(), 2);
        assert_eq!(service.index_load_count(), 2);
        assert!(service.readiness().index_ready);
    }

    // ============================================================
    // LOADING & CONCURRENCY
    // ============================================================

    #[test]
    fn test_concurrent_first_searches_load_once() {
        let index_loads = Arc::new(AtomicUsize::new(0));
        let metadata_loads = Arc::new(AtomicUsize::new(0));

        let counter = index_loads.clone();
        let index_loader: IndexLoader = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(Arc::new(circle_index(16)) as Arc<dyn VectorIndex>)
        });
        let counter = metadata_loads.clone();
        let metadata_loader: MetadataLoader = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(empty_records(16))
        });
        let service = Arc::new(SearchService::new(
            SearchSettings::default(),
            index_loader,
            metadata_loader,
        ));

        let barrier = Arc::new(Barrier::new(50));
        let handles: Vec<_> = (0..50)
            .map(|_| {
                let service = service.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    service.search(&[1.0, 0.0], 5).unwrap().len()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 5);
        }
        assert_eq!(index_loads.load(Ordering::SeqCst), 1);
        assert_eq!(metadata_loads.load(Ordering::SeqCst), 1);
        assert_eq!(service.index_load_count(), 1);
        assert_eq!(service.metadata_load_count(), 1);
    }

    #[test]
    fn test_repeated_loads_return_same_handle() {
        let service = service_with(Arc::new(circle_index(4)), empty_records(4));

        let first = service.index().unwrap();
        let second = service.index().unwrap();
        let m1 = service.metadata().unwrap();
        let m2 = service.metadata().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&m1, &m2));
        assert_eq!(service.index_load_count(), 1);
        assert_eq!(service.metadata_load_count(), 1);
    }

    #[test]
    fn test_warm_up_sets_readiness() {
        let service = service_with(Arc::new(circle_index(4)), empty_records(4));
        let before = service.readiness();
        assert!(!before.mapping_ready && !before.index_ready);

        service.warm_up().unwrap();

        let after = service.readiness();
        assert!(after.mapping_ready && after.index_ready);
    }

    #[test]
    fn test_warm_up_failure_keeps_not_ready() {
        let dir = TempDir::new().unwrap();
        let service = SearchService::from_paths(
            SearchSettings::default(),
            dir.path().join("index.bin"),
            dir.path().join("mapping.jsonl"),
        );

        let err = service.warm_up().unwrap_err();

        assert_eq!(err.path(), dir.path().join("mapping.jsonl").as_path());
        assert!(!service.readiness().mapping_ready);
    }

    #[tokio::test]
    async fn test_spawn_warmup_loads_in_background() {
        let service = Arc::new(service_with(Arc::new(circle_index(4)), empty_records(4)));

        spawn_warmup(service.clone()).await.unwrap();

        assert!(service.readiness().mapping_ready);
        assert!(service.readiness().index_ready);
    }

    // ============================================================
    // SEARCH QUALITY
    // ============================================================

    #[test]
    fn test_default_nprobe_applied_after_load() {
        let ivf = IvfFlatIndex::from_centroids(
            2,
            vec![1.0, 0.0, 0.0, 1.0, -1.0, 0.0],
            &[1.0, 0.0, 0.0, 1.0, -1.0, 0.0],
            1,
        )
        .unwrap();
        let settings = SearchSettings {
            default_nprobe: Some(3),
            ..SearchSettings::default()
        };
        let index: Arc<dyn VectorIndex> = Arc::new(ivf);
        let metadata = empty_records(3);
        let service = SearchService::new(
            settings,
            Box::new(move || Ok(index.clone())),
            Box::new(move || Ok(metadata.clone())),
        );

        assert_eq!(service.index().unwrap().search_quality(), Some(3));
        assert_eq!(service.search(&[1.0, 0.0], 3).unwrap().len(), 3);

        assert!(service.set_search_quality(1).unwrap());
        assert_eq!(service.search(&[1.0, 0.0], 3).unwrap().len(), 1);
    }

    #[test]
    fn test_search_quality_ignored_for_flat_index() {
        let settings = SearchSettings {
            default_nprobe: Some(8),
            ..SearchSettings::default()
        };
        let index: Arc<dyn VectorIndex> = Arc::new(circle_index(4));
        let metadata = empty_records(4);
        let service = SearchService::new(
            settings,
            Box::new(move || Ok(index.clone())),
            Box::new(move || Ok(metadata.clone())),
        );

        assert_eq!(service.search(&[1.0, 0.0], 2).unwrap().len(), 2);
        assert!(!service.set_search_quality(4).unwrap());
    }

    // ============================================================
    // FILE-BACKED SERVICE
    // ============================================================

    #[test]
    fn test_from_paths_end_to_end() {
        let dir = TempDir::new().unwrap();
        let index_path = dir.path().join("index.bin");
        let mapping_path = dir.path().join("mapping.jsonl");

        save_index(&index_path, &IndexArtifact::Flat(circle_index(4))).unwrap();
        std::fs::write(
            &mapping_path,
            "{\"titulo\":\"este\"}\n{\"titulo\":\"norte\"}\nbroken\n{\"titulo\":\"oeste\"}\n{\"titulo\":\"sur\"}\n",
        )
        .unwrap();

        let service = SearchService::from_paths(SearchSettings::default(), &index_path, &mapping_path);
        let results = service.search(&[0.0, 2.0], 2).unwrap();

        assert_eq!(results[0].title.as_deref(), Some("norte"));
        assert_eq!(service.metadata().unwrap().skipped(), 1);
    }

    // ============================================================
    // HANDLERS
    // ============================================================

    struct StubEmbedder {
        vector: Option<Vec<f32>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.vector
                .clone()
                .ok_or_else(|| EmbeddingError::InvalidResponse("provider down".to_string()))
        }
    }

    fn stub(vector: Option<Vec<f32>>) -> Arc<StubEmbedder> {
        Arc::new(StubEmbedder {
            vector,
            calls: AtomicUsize::new(0),
        })
    }

    fn request(q: Option<&str>, vector: Option<Vec<f32>>, top_k: Option<i64>) -> SearchRequest {
        SearchRequest {
            q: q.map(str::to_string),
            vector,
            top_k,
        }
    }

    async fn call_search(
        service: Arc<SearchService>,
        embedder: Arc<StubEmbedder>,
        req: SearchRequest,
    ) -> Result<Json<crate::search::types::SearchResponse>, (StatusCode, String)> {
        let embedder: Arc<dyn Embedder> = embedder;
        handle_search(Extension(service), Extension(embedder), Ok(Json(req)))
            .await
            .map_err(|(status, Json(body))| (status, body.detail))
    }

    fn scripted_service() -> Arc<SearchService> {
        let index = ScriptedIndex::new(2, vec![2, -1, 0], vec![0.9, 0.1, 0.5]);
        Arc::new(service_with(index, three_records()))
    }

    #[tokio::test]
    async fn test_handle_search_with_text() {
        let embedder = stub(Some(vec![1.0, 0.0]));

        let Json(response) = call_search(
            scripted_service(),
            embedder.clone(),
            request(Some("riego"), None, Some(3)),
        )
        .await
        .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].vector_id, 2);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handle_search_with_vector_skips_embedder() {
        let embedder = stub(None);

        let Json(response) = call_search(
            scripted_service(),
            embedder.clone(),
            request(None, Some(vec![0.0, 1.0]), None),
        )
        .await
        .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handle_search_empty_query() {
        for q in [None, Some(""), Some("   \n\t")] {
            let embedder = stub(Some(vec![1.0, 0.0]));

            let (status, detail) = call_search(scripted_service(), embedder.clone(), request(q, None, None))
                .await
                .unwrap_err();

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(detail, "Empty query");
            assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_handle_search_embedding_failure_is_bad_gateway() {
        let (status, detail) = call_search(
            scripted_service(),
            stub(None),
            request(Some("riego"), None, None),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(detail.contains("provider down"));
    }

    #[tokio::test]
    async fn test_handle_search_dimension_mismatch_is_bad_request() {
        let (status, _) = call_search(
            scripted_service(),
            stub(None),
            request(None, Some(vec![1.0, 0.0, 0.0]), None),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_handle_search_load_failure_is_server_error() {
        let dir = TempDir::new().unwrap();
        let service = Arc::new(SearchService::from_paths(
            SearchSettings::default(),
            dir.path().join("missing.bin"),
            dir.path().join("missing.jsonl"),
        ));

        let (status, detail) = call_search(
            service,
            stub(Some(vec![1.0, 0.0])),
            request(Some("riego"), None, None),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail.contains("missing.bin"));
    }

    #[tokio::test]
    async fn test_handle_search_negative_top_k_is_clamped() {
        let index = ScriptedIndex::new(2, vec![0], vec![1.0]);
        let service = Arc::new(service_with(index.clone(), three_records()));

        call_search(service, stub(None), request(None, Some(vec![1.0, 0.0]), Some(-5)))
            .await
            .unwrap();

        assert_eq!(index.last_k.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handle_search_uses_default_top_k() {
        let index = ScriptedIndex::new(2, vec![0], vec![1.0]);
        let service = Arc::new(service_with(index.clone(), three_records()));

        call_search(service, stub(None), request(None, Some(vec![1.0, 0.0]), None))
            .await
            .unwrap();

        assert_eq!(index.last_k.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_handle_ready_and_healthz() {
        let service = scripted_service();

        let Json(ready) = handle_ready(Extension(service.clone())).await;
        assert!(!ready.mapping_ready);

        service.warm_up().unwrap();
        let Json(ready) = handle_ready(Extension(service)).await;
        assert!(ready.mapping_ready && ready.index_ready);

        let Json(health) = handle_healthz().await;
        assert!(health.ok);
    }

    // ============================================================
    // LAZY CELL
    // ============================================================

    #[test]
    fn test_lazy_loads_once() {
        let lazy: Lazy<String> = Lazy::new();
        assert!(lazy.get().is_none());

        let first = lazy
            .get_or_try_load(|| Ok::<_, ()>(Arc::new("a".to_string())))
            .unwrap();
        let second = lazy
            .get_or_try_load(|| Ok::<_, ()>(Arc::new("b".to_string())))
            .unwrap();

        assert_eq!(first.as_str(), "a");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(lazy.load_count(), 1);
        assert!(lazy.is_loaded());
    }

    #[test]
    fn test_lazy_failure_caches_nothing() {
        let lazy: Lazy<u32> = Lazy::default();

        assert_eq!(lazy.get_or_try_load(|| Err("boom")), Err("boom"));
        assert!(!lazy.is_loaded());

        assert_eq!(*lazy.get_or_try_load(|| Ok::<_, &str>(Arc::new(7))).unwrap(), 7);
        assert_eq!(lazy.load_count(), 2);
    }
}
