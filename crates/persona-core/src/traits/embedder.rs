//! Embedding function trait.

use async_trait::async_trait;

use crate::error::{PersonaError, Result};

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier of the embedding model. Part of the index fingerprint,
    /// so switching models forces a rebuild.
    fn model_id(&self) -> &str;

    /// Embed a batch, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PersonaError::Embedding("empty embedding response".into()))
    }
}
