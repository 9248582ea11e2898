use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize LLM provider: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Failed to initialize context store: {0}")]
    Rag(#[source] anyhow::Error),

    #[error("Failed to initialize metric engine: {0}")]
    Evaluation(#[source] anyhow::Error),
}
