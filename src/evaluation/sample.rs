use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One question/answer/contexts record, scored by every backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSample {
    pub question: String,
    pub answer: String,
    pub contexts: Vec<String>,
    pub ground_truth: String,
    /// False when `ground_truth` is the configured placeholder.
    pub ground_truth_supplied: bool,
}

impl EvaluationSample {
    /// Uses `ground_truth` when it is non-blank, otherwise `placeholder`.
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        contexts: Vec<String>,
        ground_truth: Option<&str>,
        placeholder: &str,
    ) -> Self {
        let supplied = ground_truth.map(str::trim).filter(|gt| !gt.is_empty());
        Self {
            question: question.into(),
            answer: answer.into(),
            contexts,
            ground_truth: supplied.unwrap_or(placeholder).to_string(),
            ground_truth_supplied: supplied.is_some(),
        }
    }

    /// Columnar, length-1 dataset: the shape statistical evaluators consume.
    pub fn dataset(&self) -> Value {
        json!({
            "question": [self.question],
            "answer": [self.answer],
            "contexts": [self.contexts],
            "ground_truth": [self.ground_truth],
        })
    }
}
