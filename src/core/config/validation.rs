//! Shape checks for the merged configuration. Runs on load and before any
//! patch is written, so a bad edit never reaches disk.

use serde_json::{Map, Value};

use crate::core::errors::ApiError;

const BACKEND_KINDS: [&str; 3] = ["ragas", "lexical", "hallucination"];

#[derive(Debug, Clone, Copy)]
enum Field {
    Text,
    Flag,
    Texts,
    /// Inclusive integer range.
    Count(u64, u64),
    /// A score or threshold in `[0, 1]`.
    Unit,
}

const SCHEMA: &[(&str, &[(&str, Field)])] = &[
    (
        "server",
        &[
            ("host", Field::Text),
            ("port", Field::Count(0, 65_535)),
            ("cors_allowed_origins", Field::Texts),
        ],
    ),
    (
        "llm",
        &[
            ("base_url", Field::Text),
            ("model", Field::Text),
            ("judge_model", Field::Text),
            ("embedding_model", Field::Text),
            ("require_api_key", Field::Flag),
            ("temperature", Field::Unit),
            ("timeout_secs", Field::Count(1, 3_600)),
        ],
    ),
    (
        "retrieval",
        &[
            ("document_paths", Field::Texts),
            ("k", Field::Count(1, 100)),
            ("fetch_k", Field::Count(1, 1_000)),
            ("mmr_lambda", Field::Unit),
            ("chunk_size", Field::Count(50, 100_000)),
            ("chunk_overlap", Field::Count(0, 10_000)),
            ("timeout_secs", Field::Count(1, 3_600)),
            ("hashing_embedder", Field::Flag),
        ],
    ),
    (
        "evaluation",
        &[
            ("backends", Field::Texts),
            ("metric_timeout_secs", Field::Count(1, 3_600)),
            ("default_ground_truth", Field::Text),
        ],
    ),
    (
        "guardrail",
        &[
            ("faithfulness_min", Field::Unit),
            ("hallucination_max", Field::Unit),
            ("metadata_tokens", Field::Texts),
        ],
    ),
    (
        "audit",
        &[
            ("program", Field::Text),
            ("args", Field::Texts),
            ("spec_path", Field::Text),
            ("timeout_secs", Field::Count(1, 86_400)),
        ],
    ),
];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config.as_object().ok_or_else(|| invalid("root", "expected object"))?;

    for (section_name, fields) in SCHEMA {
        let section = match root.get(*section_name) {
            None => continue,
            Some(Value::Object(map)) => map,
            Some(_) => return Err(invalid(section_name, "expected object")),
        };
        for (key, field) in fields.iter() {
            if let Some(value) = section.get(*key) {
                check_field(&format!("{}.{}", section_name, key), value, *field)?;
            }
        }
    }

    if let Some(retrieval) = root.get("retrieval").and_then(Value::as_object) {
        check_overlap(retrieval)?;
    }
    if let Some(backends) = root
        .get("evaluation")
        .and_then(|v| v.get("backends"))
        .and_then(Value::as_array)
    {
        for (index, name) in backends.iter().filter_map(Value::as_str).enumerate() {
            if !BACKEND_KINDS.contains(&name) {
                return Err(invalid(
                    &format!("evaluation.backends[{}]", index),
                    &format!("unknown backend '{}'", name),
                ));
            }
        }
    }

    Ok(())
}

fn check_field(path: &str, value: &Value, field: Field) -> Result<(), ApiError> {
    match field {
        Field::Text if value.is_string() => Ok(()),
        Field::Text => Err(invalid(path, "expected string")),
        Field::Flag if value.is_boolean() => Ok(()),
        Field::Flag => Err(invalid(path, "expected boolean")),
        Field::Texts => {
            let items = value
                .as_array()
                .ok_or_else(|| invalid(path, "expected array of strings"))?;
            for (index, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(text) if !text.trim().is_empty() => {}
                    Some(_) => {
                        return Err(invalid(&format!("{}[{}]", path, index), "value cannot be empty"))
                    }
                    None => return Err(invalid(&format!("{}[{}]", path, index), "expected string")),
                }
            }
            Ok(())
        }
        Field::Count(min, max) => match value.as_u64() {
            Some(n) if (min..=max).contains(&n) => Ok(()),
            Some(_) => Err(invalid(path, &format!("must be between {} and {}", min, max))),
            None => Err(invalid(path, "expected integer")),
        },
        Field::Unit => match value.as_f64() {
            Some(n) if (0.0..=1.0).contains(&n) => Ok(()),
            Some(_) => Err(invalid(path, "must be between 0.0 and 1.0")),
            None => Err(invalid(path, "expected number")),
        },
    }
}

fn check_overlap(retrieval: &Map<String, Value>) -> Result<(), ApiError> {
    let size = retrieval.get("chunk_size").and_then(Value::as_u64);
    let overlap = retrieval.get("chunk_overlap").and_then(Value::as_u64);
    match (size, overlap) {
        (Some(size), Some(overlap)) if overlap >= size => Err(invalid(
            "retrieval.chunk_overlap",
            "must be smaller than chunk_size",
        )),
        _ => Ok(()),
    }
}

fn invalid(path: &str, problem: &str) -> ApiError {
    ApiError::BadRequest(format!("Invalid config at '{}': {}", path, problem))
}
