//! Retrieval: the policy document loader and the context stores.
//!
//! - `PolicyLoader`: reads policy files into section-aware, metadata-tagged chunks
//! - `InMemoryContextStore`: embedding index with MMR re-ranking
//! - `ContextStore`: the trait the pipeline retrieves through

mod loader;
mod memory;
mod store;

pub use loader::{infer_metadata, LoaderConfig, PolicyLoader};
pub use memory::{InMemoryContextStore, MmrConfig};
pub use store::{ContextStore, PassageMetadata, RetrievedContext, RetrievedPassage};
