//! Policy document loader.
//!
//! Reads plain-text / markdown policy files, splits them on `Section`
//! headings, then into overlapping chunks that try to end on a sentence
//! boundary. Metadata (state, year) is inferred from the file name.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::store::{PassageMetadata, RetrievedPassage};
use crate::core::errors::ApiError;

const KNOWN_STATES: [&str; 5] = ["Tennessee", "Washington", "California", "Texas", "New York"];
const DOCUMENT_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

/// Configuration for the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks
    pub chunk_overlap: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

pub struct PolicyLoader {
    config: LoaderConfig,
}

impl PolicyLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Loads every file (or every policy file inside each directory).
    pub fn load_paths(&self, paths: &[PathBuf]) -> Result<Vec<RetrievedPassage>, ApiError> {
        let mut passages = Vec::new();
        for path in paths {
            for file in collect_files(path)? {
                let text = fs::read_to_string(&file).map_err(|e| {
                    ApiError::Internal(format!("failed to read {}: {}", file.display(), e))
                })?;
                let before = passages.len();
                passages.extend(self.chunk_document(&text, &file.to_string_lossy()));
                tracing::debug!(
                    "Loaded {} chunks from {}",
                    passages.len() - before,
                    file.display()
                );
            }
        }
        Ok(passages)
    }

    /// Section split, then overlapping chunks, each tagged with metadata.
    pub fn chunk_document(&self, text: &str, source: &str) -> Vec<RetrievedPassage> {
        let metadata = infer_metadata(source);
        split_sections(text)
            .iter()
            .flat_map(|section| self.split_into_chunks(section))
            .filter(|chunk| !chunk.is_empty())
            .map(|content| RetrievedPassage {
                content,
                metadata: metadata.clone(),
            })
            .collect()
    }

    /// Split text into overlapping chunks.
    fn split_into_chunks(&self, text: &str) -> Vec<String> {
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap.min(chunk_size - 1);

        let mut chunks = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        let mut start = 0;
        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let chunk_text: String = chars[start..end].iter().collect();

            // Try to break at sentence boundary
            let final_text = if end < total_chars {
                find_sentence_boundary(&chunk_text)
            } else {
                chunk_text
            };
            let consumed = final_text.chars().count();

            chunks.push(final_text.trim().to_string());

            if end >= total_chars {
                break;
            }
            start += consumed.saturating_sub(overlap).max(1);
        }

        chunks
    }
}

/// State from the known list, year from the file name (2024 / 2022, else 2023).
pub fn infer_metadata(source: &str) -> PassageMetadata {
    let file_name = Path::new(source)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| source.to_string());
    let normalized = file_name.replace(['_', '-'], " ");

    let state = KNOWN_STATES
        .iter()
        .find(|state| normalized.contains(*state))
        .map(|state| state.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let year = if file_name.contains("2024") {
        2024
    } else if file_name.contains("2022") {
        2022
    } else {
        2023
    };

    PassageMetadata {
        state,
        year,
        source: source.to_string(),
    }
}

/// Splits on the word `Section`, keeping the heading on numbered parts.
fn split_sections(text: &str) -> Vec<String> {
    text.split("Section")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            if part.starts_with(|c: char| c.is_ascii_digit()) {
                format!("Section {}", part)
            } else {
                part.to_string()
            }
        })
        .collect()
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>, ApiError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(ApiError::NotFound(format!(
            "policy document path {} does not exist",
            path.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(ApiError::internal)? {
        let entry_path = entry.map_err(ApiError::internal)?.path();
        let is_document = entry_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if entry_path.is_file() && is_document {
            files.push(entry_path);
        }
    }
    files.sort();
    Ok(files)
}

/// Find a good sentence boundary within the chunk.
fn find_sentence_boundary(text: &str) -> String {
    // Look for sentence endings near the end of the chunk
    let sentence_endings = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

    // Search in the last 20% of the chunk
    let mut search_start = (text.len() * 80) / 100;
    while !text.is_char_boundary(search_start) {
        search_start += 1;
    }
    let search_text = &text[search_start..];

    for ending in sentence_endings.iter() {
        if let Some(pos) = search_text.rfind(ending) {
            let cut_pos = search_start + pos + ending.len();
            return text[..cut_pos].to_string();
        }
    }

    // No good boundary found, return as-is
    text.to_string()
}
