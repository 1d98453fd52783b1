use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::agent::AgentStats;
use crate::models::IngestReport;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub collection: String,
    pub vector_entries: usize,
    pub lexical_documents: usize,
    pub agent: AgentStats,
}

/// GET /api/stats — call counters and index sizes.
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        collection: state.config.collection.clone(),
        vector_entries: state.vectors.len(),
        lexical_documents: state.bm25.read().len(),
        agent: state.agent.stats(),
    })
}

/// POST /api/ingest — (re)ingest the configured document directory.
pub async fn ingest(
    State(state): State<AppState>,
) -> Result<Json<IngestReport>, (StatusCode, String)> {
    state.ingest().await.map(Json).map_err(|e| {
        tracing::error!("Ingestion failed: {e:#}");
        (StatusCode::BAD_GATEWAY, format!("Ingestion failed: {e:#}"))
    })
}
