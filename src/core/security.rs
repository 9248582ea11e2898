//! Session token guarding the admin endpoints (config and audit).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";
const SESSION_TOKEN_ENV: &str = "POLICYQA_SESSION_TOKEN";

#[derive(Debug, Clone)]
pub struct SessionToken {
    value: String,
}

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Uses `POLICYQA_SESSION_TOKEN` when set; otherwise generates a token and
/// writes it, owner-readable only, to `<data dir>/.session_token`.
pub fn init_session_token(paths: &AppPaths) -> SessionToken {
    if let Ok(token) = env::var(SESSION_TOKEN_ENV) {
        if !token.trim().is_empty() {
            return SessionToken::new(token);
        }
    }

    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let token_path = session_token_path(paths);
    if let Err(err) = fs::write(&token_path, &token) {
        tracing::warn!("Failed to write session token: {}", err);
    } else {
        restrict_permissions(&token_path);
        tracing::info!("Admin session token written to {}", token_path.display());
    }

    SessionToken::new(token)
}

pub fn session_token_path(paths: &AppPaths) -> PathBuf {
    paths.user_data_dir.join(".session_token")
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = fs::metadata(path) {
        let mut perms = metadata.permissions();
        perms.set_mode(0o600);
        let _ = fs::set_permissions(path, perms);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

pub fn require_api_key(headers: &HeaderMap, expected: &SessionToken) -> Result<(), ApiError> {
    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() || header_value != expected.value() {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn require_api_key_accepts_valid_header() {
        let expected = SessionToken::new("secret");
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));

        assert!(require_api_key(&headers, &expected).is_ok());
    }

    #[test]
    fn require_api_key_rejects_missing_or_invalid_header() {
        let expected = SessionToken::new("secret");

        let missing = require_api_key(&HeaderMap::new(), &expected);
        assert!(matches!(missing, Err(ApiError::Unauthorized)));

        let mut invalid_headers = HeaderMap::new();
        invalid_headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        let invalid = require_api_key(&invalid_headers, &expected);
        assert!(matches!(invalid, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn require_api_key_rejects_non_utf8_header_value() {
        let expected = SessionToken::new("secret");
        let mut headers = HeaderMap::new();
        let non_utf8 = HeaderValue::from_bytes(&[0xFF, 0xFE, 0xFD])
            .expect("header value bytes should be accepted");
        headers.insert(API_KEY_HEADER, non_utf8);

        assert!(matches!(
            require_api_key(&headers, &expected),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn generated_token_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::rooted_at(dir.path());
        if env::var(SESSION_TOKEN_ENV).is_ok() {
            return;
        }

        let token = init_session_token(&paths);
        let stored = fs::read_to_string(session_token_path(&paths)).unwrap();
        assert_eq!(stored, token.value());
        assert_eq!(token.value().len(), 64);
    }
}
