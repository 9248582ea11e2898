use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::defaults::default_config;
use super::paths::AppPaths;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

/// Keys whose values live in `secrets.yaml` and are masked over HTTP.
const SECRET_KEYS: [&str; 3] = ["api_key", "session_token", "password"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    /// `POLICYQA_CONFIG_PATH`, then a user-level `config.yml`, then the
    /// project's own.
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = config_path_override() {
            return path;
        }
        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            user_config
        } else {
            self.paths.project_root.join("config.yml")
        }
    }

    /// Edits always land in the user-level file so the shipped one stays pristine.
    pub fn config_write_path(&self) -> PathBuf {
        config_path_override().unwrap_or_else(|| self.paths.user_data_dir.join("config.yml"))
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Built-in defaults, overlaid by `config.yml`, overlaid by `secrets.yaml`.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let layered = [
            read_mapping(&self.config_path())?,
            read_mapping(&self.secrets_path())?,
        ]
        .iter()
        .fold(default_config(), |acc, layer| deep_merge(&acc, layer));
        validate_config(&layered)?;
        Ok(layered)
    }

    /// Merges `patch` into the stored config; masked secrets keep their value.
    pub fn update_config(&self, patch: Value) -> Result<(), ApiError> {
        let current = self.load_config()?;
        let updated = deep_merge(&current, &restore_redacted_values(&patch, &current));
        validate_config(&updated)?;

        let (public, secrets) = split_config(&updated);
        write_yaml(&self.config_write_path(), &public)?;
        write_yaml(&self.secrets_path(), &secrets)?;
        tracing::info!("Configuration saved to {}", self.config_write_path().display());
        Ok(())
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn config_path_override() -> Option<PathBuf> {
    env::var("POLICYQA_CONFIG_PATH").ok().map(PathBuf::from)
}

/// A missing or empty file is an empty mapping.
fn read_mapping(path: &Path) -> Result<Value, ApiError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(ApiError::internal(err)),
    };

    let parsed: Value = serde_yaml::from_str(&contents).map_err(|err| {
        ApiError::Configuration(format!("failed to parse {}: {}", path.display(), err))
    })?;
    match parsed {
        Value::Null => Ok(Value::Object(Map::new())),
        value @ Value::Object(_) => Ok(value),
        _ => Err(ApiError::Configuration(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

fn write_yaml(path: &Path, value: &Value) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ApiError::internal)?;
    }
    let yaml = serde_yaml::to_string(value).map_err(ApiError::internal)?;
    fs::write(path, yaml).map_err(ApiError::internal)
}

fn deep_merge(base: &Value, overlay: &Value) -> Value {
    let (Value::Object(base_map), Value::Object(overlay_map)) = (base, overlay) else {
        return overlay.clone();
    };
    let mut merged = base_map.clone();
    for (key, value) in overlay_map {
        let next = match merged.get(key) {
            Some(existing) => deep_merge(existing, value),
            None => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    Value::Object(merged)
}

fn split_config(config: &Value) -> (Value, Value) {
    let Value::Object(map) = config else {
        return (config.clone(), Value::Object(Map::new()));
    };

    let mut public = Map::new();
    let mut secrets = Map::new();
    for (key, value) in map {
        if value.is_object() {
            let (public_part, secret_part) = split_config(value);
            if has_entries(&public_part) {
                public.insert(key.clone(), public_part);
            }
            if has_entries(&secret_part) {
                secrets.insert(key.clone(), secret_part);
            }
        } else if is_secret_key(key) && !value.is_null() {
            secrets.insert(key.clone(), value.clone());
        } else {
            public.insert(key.clone(), value.clone());
        }
    }
    (Value::Object(public), Value::Object(secrets))
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    let shown = if is_secret_key(key) && !val.is_null() {
                        Value::String(REDACT_PLACEHOLDER.to_string())
                    } else {
                        redact_sensitive_values(val)
                    };
                    (key.clone(), shown)
                })
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Puts stored secrets back wherever a patch echoes the placeholder.
fn restore_redacted_values(patch: &Value, current: &Value) -> Value {
    let Value::Object(map) = patch else {
        return patch.clone();
    };

    let mut restored = Map::new();
    for (key, value) in map {
        let stored = current.get(key);
        if value.as_str() == Some(REDACT_PLACEHOLDER) {
            if let Some(secret) = stored {
                restored.insert(key.clone(), secret.clone());
            }
        } else if value.is_object() {
            restored.insert(
                key.clone(),
                restore_redacted_values(value, stored.unwrap_or(&Value::Null)),
            );
        } else {
            restored.insert(key.clone(), value.clone());
        }
    }
    Value::Object(restored)
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SECRET_KEYS.iter().any(|secret| key == *secret || key.ends_with(&format!("_{}", secret)))
}

fn has_entries(value: &Value) -> bool {
    value.as_object().map(|map| !map.is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "guardrail": { "faithfulness_min": 0.4, "hallucination_max": 0.5 },
            "retrieval": { "document_paths": ["a.txt", "b.txt"] }
        });
        let override_value = json!({
            "guardrail": { "faithfulness_min": 0.6 },
            "retrieval": { "document_paths": ["c.txt"] },
            "audit": { "timeout_secs": 60 }
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "guardrail": { "faithfulness_min": 0.6, "hallucination_max": 0.5 },
                "retrieval": { "document_paths": ["c.txt"] },
                "audit": { "timeout_secs": 60 }
            })
        );
    }

    #[test]
    fn split_config_moves_api_key_to_secrets() {
        let input = json!({
            "llm": {
                "api_key": "sk-test",
                "model": "gpt-4o-mini",
                "judge_model": "gpt-4o"
            }
        });

        let (public_config, secret_config) = split_config(&input);

        assert_eq!(
            public_config,
            json!({ "llm": { "model": "gpt-4o-mini", "judge_model": "gpt-4o" } })
        );
        assert_eq!(secret_config, json!({ "llm": { "api_key": "sk-test" } }));
    }

    #[test]
    fn redacted_values_are_restored_on_update() {
        let original = json!({ "llm": { "api_key": "sk-live", "model": "a" } });
        let redacted = redact_sensitive_values(&original);
        assert_eq!(redacted["llm"]["api_key"], json!("****"));

        let mut edited = redacted.clone();
        edited["llm"]["model"] = json!("b");
        let restored = restore_redacted_values(&edited, &original);

        assert_eq!(restored, json!({ "llm": { "api_key": "sk-live", "model": "b" } }));
    }

    #[test]
    fn load_config_layers_defaults_file_and_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::rooted_at(dir.path()));
        fs::write(
            dir.path().join("config.yml"),
            "guardrail:\n  faithfulness_min: 0.55\n",
        )
        .unwrap();
        fs::write(&paths.secrets_path, "llm:\n  api_key: sk-from-secrets\n").unwrap();

        let service = ConfigService::new(paths);
        let config = service.load_config().unwrap();

        assert_eq!(config["guardrail"]["faithfulness_min"], json!(0.55));
        assert_eq!(config["guardrail"]["hallucination_max"], json!(0.5));
        assert_eq!(config["llm"]["api_key"], json!("sk-from-secrets"));
    }

    #[test]
    fn load_config_rejects_non_mapping_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::rooted_at(dir.path()));
        fs::write(dir.path().join("config.yml"), "- just\n- a list\n").unwrap();

        let err = ConfigService::new(paths).load_config().unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }
}
