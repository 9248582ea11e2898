use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pipeline = &state.pipeline;
    Json(json!({
        "status": "ok",
        "passages": pipeline.store().len(),
        "store": pipeline.store().name(),
        "generator": pipeline.generator().name(),
        "metric_backends": pipeline
            .metrics()
            .backends()
            .iter()
            .map(|backend| backend.name())
            .collect::<Vec<_>>(),
    }))
}
