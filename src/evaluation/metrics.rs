use serde::{Deserialize, Serialize};

/// Which family produced a metric. The guardrail relies on one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    Statistical,
    ModelGraded,
}

/// Direction of a score. Every `MetricScore` carries it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HigherIsBetter,
    /// Degree-of-badness scores, e.g. the hallucination (contradiction) rate.
    HigherIsWorse,
}

impl Polarity {
    /// The value that pushes the guardrail toward BLOCK.
    pub fn conservative_default(self) -> f64 {
        match self {
            Polarity::HigherIsBetter => 0.0,
            Polarity::HigherIsWorse => 1.0,
        }
    }

    /// The more cautious of two values under this polarity.
    pub fn most_conservative(self, a: f64, b: f64) -> f64 {
        match self {
            Polarity::HigherIsBetter => a.min(b),
            Polarity::HigherIsWorse => a.max(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Faithfulness,
    AnswerRelevancy,
    ContextPrecision,
    ContextRecall,
    AnswerCorrectness,
    /// Fraction of retrieved contexts the answer contradicts.
    Hallucination,
}

impl MetricKind {
    pub const STATISTICAL: [MetricKind; 5] = [
        MetricKind::Faithfulness,
        MetricKind::AnswerRelevancy,
        MetricKind::ContextPrecision,
        MetricKind::ContextRecall,
        MetricKind::AnswerCorrectness,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Faithfulness => "faithfulness",
            MetricKind::AnswerRelevancy => "answer_relevancy",
            MetricKind::ContextPrecision => "context_precision",
            MetricKind::ContextRecall => "context_recall",
            MetricKind::AnswerCorrectness => "answer_correctness",
            MetricKind::Hallucination => "hallucination",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Faithfulness => "Faithfulness",
            MetricKind::AnswerRelevancy => "Answer Relevancy",
            MetricKind::ContextPrecision => "Context Precision",
            MetricKind::ContextRecall => "Context Recall",
            MetricKind::AnswerCorrectness => "Answer Correctness",
            MetricKind::Hallucination => "Hallucination",
        }
    }

    pub fn polarity(self) -> Polarity {
        match self {
            MetricKind::Hallucination => Polarity::HigherIsWorse,
            _ => Polarity::HigherIsBetter,
        }
    }

    pub fn family(self) -> MetricFamily {
        match self {
            MetricKind::Hallucination => MetricFamily::ModelGraded,
            _ => MetricFamily::Statistical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScoreOutcome {
    Measured,
    /// The backend failed; `value` holds the conservative default.
    Defaulted { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub engine: String,
    pub kind: MetricKind,
    pub value: f64,
    pub polarity: Polarity,
    pub outcome: ScoreOutcome,
    /// Free-text explanation from model-graded backends.
    pub reason: Option<String>,
}

impl MetricScore {
    /// A backend-reported value, clamped into [0, 1]. Non-finite values are
    /// treated as a backend failure.
    pub fn measured(engine: &str, kind: MetricKind, value: f64) -> Self {
        if !value.is_finite() {
            return Self::defaulted(engine, kind, format!("non-finite {} score", kind.as_str()));
        }
        Self {
            engine: engine.to_string(),
            kind,
            value: value.clamp(0.0, 1.0),
            polarity: kind.polarity(),
            outcome: ScoreOutcome::Measured,
            reason: None,
        }
    }

    pub fn defaulted(engine: &str, kind: MetricKind, error: impl Into<String>) -> Self {
        let polarity = kind.polarity();
        Self {
            engine: engine.to_string(),
            kind,
            value: polarity.conservative_default(),
            polarity,
            outcome: ScoreOutcome::Defaulted {
                error: error.into(),
            },
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self.outcome, ScoreOutcome::Defaulted { .. })
    }
}
