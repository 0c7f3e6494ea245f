//! # Persona Providers
//!
//! Hosted model clients. Chat completions and embeddings both go through the
//! OpenAI-compatible wire format, so one base URL and key serve both.

pub mod embeddings;
pub mod openai_compatible;

use std::sync::Arc;

use persona_core::config::PersonaConfig;
use persona_core::error::Result;
use persona_core::traits::{Embedder, Provider};

pub use embeddings::OpenAiEmbedder;
pub use openai_compatible::OpenAiCompatibleProvider;

/// Chat provider from `[llm]`. Fails without an API key.
pub fn create_provider(config: &PersonaConfig) -> Result<Arc<dyn Provider>> {
    Ok(Arc::new(OpenAiCompatibleProvider::from_config(&config.llm)?))
}

/// Embedding client from `[llm]`. Fails without an API key.
pub fn create_embedder(config: &PersonaConfig) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(OpenAiEmbedder::from_config(&config.llm)?))
}
