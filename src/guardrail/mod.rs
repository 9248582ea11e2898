//! Output guardrail: decides whether a generated answer is released or
//! replaced with a block message.

mod decision;
mod rules;

pub use decision::{Guardrail, GuardrailDecision, GuardrailThresholds, TriggeringRule, Verdict};
pub use rules::{StructuralFinding, StructuralScanner};
