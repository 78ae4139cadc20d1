//! Service Configuration
//!
//! Every setting comes from an environment variable with a default, except
//! the embedding provider key which is required. Parsing goes through a
//! lookup function so tests can supply values without touching the process
//! environment.

use crate::embedding::EmbedderConfig;
use crate::search::SearchSettings;
use crate::search::types::{DEFAULT_SNIPPET_CHARS, DEFAULT_TOP_K, MAX_TOP_K};

use anyhow::{Context, Result, anyhow};
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

const DEFAULT_ORIGINS: &str = "http://localhost:5173,https://www.unesumrepo.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub index_path: PathBuf,
    pub mapping_path: PathBuf,
    pub default_top_k: usize,
    pub default_nprobe: usize,
    pub snippet_chars: usize,
    pub embed_model: String,
    pub embed_dimensions: usize,
    pub embed_api_base: String,
    pub api_key: String,
    pub embed_timeout: Duration,
    pub embed_max_retries: usize,
    pub allow_origins: Vec<String>,
    pub log_level: tracing::Level,
    pub warmup: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`, which returns the raw value of a variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("OPENAI_API_KEY").ok_or_else(|| {
            anyhow!("OPENAI_API_KEY is not set; the embedding provider requires an API key")
        })?;

        let default_top_k: usize = parse_or(&get, "DEFAULT_TOP_K", DEFAULT_TOP_K)?;
        let snippet_chars: usize = parse_or(&get, "SNIPPET_CHARS", DEFAULT_SNIPPET_CHARS)?;
        if snippet_chars == 0 {
            return Err(anyhow!("SNIPPET_CHARS must be greater than zero"));
        }
        let embed_dimensions: usize = parse_or(&get, "EMBED_DIMENSIONS", 512)?;
        if embed_dimensions == 0 {
            return Err(anyhow!("EMBED_DIMENSIONS must be greater than zero"));
        }

        let timeout_secs: f64 = parse_or(&get, "OPENAI_TIMEOUT", 20.0)?;
        let embed_timeout = Duration::try_from_secs_f64(timeout_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| anyhow!("OPENAI_TIMEOUT must be a positive number of seconds"))?;

        let log_level = get("LOG_LEVEL")
            .map(|v| {
                tracing::Level::from_str(&v).map_err(|_| anyhow!("invalid LOG_LEVEL: {:?}", v))
            })
            .transpose()?
            .unwrap_or(tracing::Level::INFO);

        let allow_origins = get("ALLOW_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            bind_addr: parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            index_path: get("INDEX_PATH")
                .unwrap_or_else(|| "/app/data/index.bin".to_string())
                .into(),
            mapping_path: get("MAPPING_PATH")
                .unwrap_or_else(|| "/app/data/mapping.jsonl".to_string())
                .into(),
            default_top_k: default_top_k.clamp(1, MAX_TOP_K),
            default_nprobe: parse_or(&get, "SEARCH_NPROBE", 16)?,
            snippet_chars,
            embed_model: get("EMBED_MODEL").unwrap_or_else(|| "text-embedding-3-small".to_string()),
            embed_dimensions,
            embed_api_base: get("EMBED_API_BASE")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            embed_timeout,
            embed_max_retries: parse_or(&get, "OPENAI_MAX_RETRIES", 2)?,
            allow_origins,
            log_level,
            warmup: parse_flag(&get, "WARMUP", true)?,
        })
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            default_top_k: self.default_top_k,
            max_top_k: MAX_TOP_K,
            snippet_chars: self.snippet_chars,
            default_nprobe: Some(self.default_nprobe),
        }
    }

    /// CORS for the configured origins; any method and any header.
    pub fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allow_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }

    pub fn embedder_config(&self) -> EmbedderConfig {
        EmbedderConfig {
            api_base: self.embed_api_base.clone(),
            api_key: self.api_key.clone(),
            model: self.embed_model.clone(),
            dimensions: self.embed_dimensions,
            timeout: self.embed_timeout,
            max_retries: self.embed_max_retries,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

/// Boolean switch; accepts `true/false`, `1/0`, `yes/no` and `on/off` in any case.
fn parse_flag<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("invalid value for {}: {:?}", key, raw)),
    }
}
