use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::audit::AuditSpec;
use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AuditRequest {
    /// Overrides `audit.spec_path`; relative paths resolve against the project root.
    #[serde(default)]
    pub spec_path: Option<String>,
}

pub async fn run_audit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<AuditRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;

    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let configured = &state.pipeline.settings().audit.spec_path;
    let path: PathBuf = state
        .paths
        .resolve(request.spec_path.as_deref().unwrap_or(configured));

    let outcome = state.audit.run(&AuditSpec { path }).await;
    Ok(Json(outcome))
}
