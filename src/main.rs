use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use thesis_search::config::Config;
use thesis_search::embedding::{Embedder, HttpEmbedder};
use thesis_search::search::handlers::{handle_healthz, handle_ready, handle_search};
use thesis_search::search::{SearchService, spawn_warmup};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Usage: {} [--bind <addr:port>]", args[0]);
                    std::process::exit(1);
                };
                config.bind_addr = value.parse::<SocketAddr>()?;
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    tracing::info!(
        "Starting thesis search on {} (index={}, mapping={})",
        config.bind_addr,
        config.index_path.display(),
        config.mapping_path.display()
    );

    // 1. Search core (artifacts load lazily):
    let service = Arc::new(SearchService::from_paths(
        config.search_settings(),
        &config.index_path,
        &config.mapping_path,
    ));

    // 2. Embedding provider:
    let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(config.embedder_config()));
    tracing::info!(
        "Embedding model {} ({} dims), timeout {:?}, retries {}",
        config.embed_model,
        config.embed_dimensions,
        config.embed_timeout,
        config.embed_max_retries
    );

    // 3. Background warmup, so the socket opens immediately:
    if config.warmup {
        spawn_warmup(service.clone());
    }

    // 4. HTTP Router:
    let app = Router::new()
        .route("/healthz", get(handle_healthz))
        .route("/ready", get(handle_ready))
        .route("/search", post(handle_search))
        .layer(Extension(service))
        .layer(Extension(embedder))
        .layer(config.cors_layer())
        .layer(TraceLayer::new_for_http());

    // 5. Start HTTP server:
    tracing::info!("HTTP server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
