use crate::metadata::{Authors, DocumentRecord, IntOrText};
use serde::{Deserialize, Serialize};

/// Upper bound on results per query.
pub const MAX_TOP_K: usize = 50;
/// Snippet length used when none is configured.
pub const DEFAULT_SNIPPET_CHARS: usize = 300;
/// Result count used when a request does not specify one.
pub const DEFAULT_TOP_K: usize = 10;

/// Tunables for [`SearchService`](super::service::SearchService).
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub snippet_chars: usize,
    /// Probe count applied to partitioned indexes right after they load.
    pub default_nprobe: Option<usize>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_top_k: DEFAULT_TOP_K,
            max_top_k: MAX_TOP_K,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
            default_nprobe: None,
        }
    }
}

/// One ranked hit, flattened with its document metadata.
///
/// Field names on the wire follow the mapping file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// 1-based position among the returned results.
    pub rank: usize,
    pub score: f32,
    pub vector_id: i64,
    #[serde(rename = "titulo")]
    pub title: Option<String>,
    #[serde(rename = "autores")]
    pub authors: Option<Authors>,
    #[serde(rename = "anio_publicacion")]
    pub year: Option<IntOrText>,
    #[serde(rename = "pagina_inicio")]
    pub start_page: Option<IntOrText>,
    #[serde(rename = "pagina_fin")]
    pub end_page: Option<IntOrText>,
    pub pdf_url: Option<String>,
    #[serde(rename = "nombre_archivo")]
    pub file_name: Option<String>,
    pub snippet: String,
}

impl SearchResult {
    pub fn from_record(
        rank: usize,
        vector_id: i64,
        score: f32,
        record: &DocumentRecord,
        snippet_chars: usize,
    ) -> Self {
        Self {
            rank,
            score,
            vector_id,
            title: record.title.clone(),
            authors: record.authors.clone(),
            year: record.year.clone(),
            start_page: record.start_page.clone(),
            end_page: record.end_page.clone(),
            pdf_url: record.pdf_url.clone(),
            file_name: record.file_name.clone(),
            snippet: record.snippet(snippet_chars),
        }
    }
}

/// Which artifacts have finished loading. Each flag only ever goes false → true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub mapping_ready: bool,
    pub index_ready: bool,
}

// --- HTTP DTOs ---

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Free-text query, embedded before searching.
    #[serde(default)]
    pub q: Option<String>,
    /// Precomputed query embedding; when present `q` is not embedded.
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub top_k: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}
