use serde_json::{json, Value};

pub const DEFAULT_GROUND_TRUTH: &str =
    "Refer to the standard corporate policy document for verification.";

pub const DEFAULT_METADATA_TOKENS: [&str; 5] = [
    "page_content",
    "\"metadata\"",
    "'metadata'",
    "[Source:",
    "chunk_id",
];

pub fn default_config() -> Value {
    json!({
        "server": {
            "host": "127.0.0.1",
            "port": 7860
        },
        "llm": {
            "base_url": "https://api.openai.com",
            "model": "gpt-4o-mini",
            "judge_model": "gpt-4o-mini",
            "embedding_model": "text-embedding-3-small",
            "require_api_key": true,
            "temperature": 0.0,
            "timeout_secs": 60
        },
        "retrieval": {
            "document_paths": ["data/company_policy.txt"],
            "k": 4,
            "fetch_k": 20,
            "mmr_lambda": 0.5,
            "chunk_size": 500,
            "chunk_overlap": 50,
            "timeout_secs": 30,
            "hashing_embedder": false
        },
        "evaluation": {
            "backends": ["ragas", "hallucination"],
            "metric_timeout_secs": 120,
            "default_ground_truth": DEFAULT_GROUND_TRUTH
        },
        "guardrail": {
            "faithfulness_min": 0.4,
            "hallucination_max": 0.5,
            "metadata_tokens": DEFAULT_METADATA_TOKENS
        },
        "audit": {
            "program": "policyqa-eval",
            "args": ["--suite"],
            "spec_path": "config/audit_suite.yml",
            "timeout_secs": 300
        }
    })
}
