use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigSaved {
    pub status: &'static str,
    /// The running pipeline keeps the thresholds it started with.
    pub restart_required: bool,
}

/// Layered configuration with secrets masked.
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let config = state.config.load_config()?;
    Ok(Json(state.config.redact_sensitive_values(&config)))
}

pub async fn patch_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Result<Json<ConfigSaved>, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    if !patch.is_object() {
        return Err(ApiError::BadRequest(
            "config patch must be a JSON object".to_string(),
        ));
    }
    state.config.update_config(patch)?;
    Ok(Json(ConfigSaved {
        status: "saved",
        restart_required: true,
    }))
}
