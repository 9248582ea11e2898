pub mod embedder;
pub mod generator;
pub mod openai;
pub mod provider;
pub mod types;

pub use embedder::{Embedder, HashingEmbedder, ProviderEmbedder};
pub use generator::{AnswerGenerator, LlmAnswerGenerator};
pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};
