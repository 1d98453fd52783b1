use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use kb_agent::api;
use kb_agent::config::Config;
use kb_agent::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("LLM endpoint: {}", config.llm.base_url);

    let state = AppState::new(config.clone())?;

    // First start with an empty index: ingest whatever the document
    // directory holds. Failure here is not fatal — the service still
    // answers via the direct path.
    if state.vectors.is_empty() && config.document_dir.exists() {
        match state.ingest().await {
            Ok(report) => tracing::info!(
                "Startup ingestion: {} documents, {} chunks indexed",
                report.documents,
                report.indexed
            ),
            Err(e) => tracing::warn!("Startup ingestion failed: {e:#}"),
        }
    }

    let app = Router::new()
        .route("/api/chat", post(api::chat::chat))
        .route("/api/health", get(api::admin::health))
        .route("/api/stats", get(api::admin::stats))
        .route("/api/ingest", post(api::admin::ingest))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
