//! Structural output checks: raw JSON, leaked retrieval metadata and fenced
//! code blocks. Plain-text policy answers never contain any of these.

use std::sync::OnceLock;

use regex::RegexSet;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralFinding {
    RawJson,
    MetadataToken(String),
    FencedCode,
}

impl StructuralFinding {
    /// Short label safe to show to users; never includes the offending text.
    pub fn label(&self) -> &'static str {
        match self {
            StructuralFinding::RawJson => "raw JSON",
            StructuralFinding::MetadataToken(_) => "retrieval metadata",
            StructuralFinding::FencedCode => "fenced code block",
        }
    }
}

fn json_markers() -> &'static RegexSet {
    static MARKERS: OnceLock<RegexSet> = OnceLock::new();
    MARKERS.get_or_init(|| {
        RegexSet::new([
            // object with a quoted key
            r#"\{\s*"[^"\n]{1,80}"\s*:"#,
            // key/value pair opening a nested structure
            r#""[^"\n]{1,80}"\s*:\s*[\{\[]"#,
        ])
        .expect("static regex set")
    })
}

pub struct StructuralScanner {
    metadata_tokens: Vec<String>,
}

impl StructuralScanner {
    pub fn new(metadata_tokens: Vec<String>) -> Self {
        Self {
            metadata_tokens: metadata_tokens
                .into_iter()
                .filter(|token| !token.is_empty())
                .collect(),
        }
    }

    /// First structural problem found, if any. Fenced blocks are reported
    /// ahead of their contents.
    pub fn scan(&self, answer: &str) -> Option<StructuralFinding> {
        if answer.contains("```") || answer.contains("~~~") {
            return Some(StructuralFinding::FencedCode);
        }
        if json_markers().is_match(answer) || is_json_document(answer) {
            return Some(StructuralFinding::RawJson);
        }
        self.metadata_tokens
            .iter()
            .find(|token| answer.contains(token.as_str()))
            .map(|token| StructuralFinding::MetadataToken(token.clone()))
    }
}

/// The whole answer parses as a JSON object or array. Bracketed citations
/// like `[1] ... [2]` do not.
fn is_json_document(answer: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(answer.trim()),
        Ok(Value::Object(_)) | Ok(Value::Array(_))
    )
}
