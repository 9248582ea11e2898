//! Query pipeline.
//!
//! `PipelineContext` holds the store, generator, metric engine and guardrail;
//! `predict` drives one question through all of them.

pub mod context;
pub mod predict;
pub mod splitter;

pub use context::{build_backends, PipelineContext};
pub use predict::{predict, predict_with_ground_truth, run_query, PipelineRun, PredictOutcome};
pub use splitter::{split_response, SplitResponse, DIRECT_RESPONSE, FINAL_ANSWER_DELIMITER};
