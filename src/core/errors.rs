use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{backend} failed: {message}")]
    Backend { backend: String, message: String },
    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: String, millis: u64 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn backend<E: std::fmt::Display>(backend: &str, err: E) -> Self {
        ApiError::Backend {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }

    pub fn timeout(operation: &str, limit: std::time::Duration) -> Self {
        ApiError::Timeout {
            operation: operation.to_string(),
            millis: limit.as_millis() as u64,
        }
    }
}

/// Runs `fut` under `limit`; an elapsed timer becomes `ApiError::Timeout`.
pub async fn with_timeout<T, F>(
    operation: &str,
    limit: std::time::Duration,
    fut: F,
) -> Result<T, ApiError>
where
    F: std::future::Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::timeout(operation, limit)),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Backend { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            ApiError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn with_timeout_passes_through_results() {
        let ok = with_timeout("fast", Duration::from_millis(50), async { Ok::<_, ApiError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_reports_elapsed_operation() {
        let slow = with_timeout("retrieval", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, ApiError>(())
        })
        .await;

        match slow {
            Err(ApiError::Timeout { operation, millis }) => {
                assert_eq!(operation, "retrieval");
                assert_eq!(millis, 10);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
