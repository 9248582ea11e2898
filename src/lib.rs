//! Policy question answering over retrieved documents, with every answer
//! scored by metric backends and checked by a guardrail before release.

pub mod audit;
pub mod core;
pub mod evaluation;
pub mod guardrail;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod server;
pub mod state;
pub mod text;
pub mod vector_math;
