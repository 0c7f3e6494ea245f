//! OpenAI-compatible `/embeddings` client.

use async_trait::async_trait;
use persona_core::config::LlmConfig;
use persona_core::error::{PersonaError, Result};
use persona_core::traits::Embedder;
use serde_json::{Value, json};

pub struct OpenAiEmbedder {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(model: &str, base_url: &str, api_key: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(PersonaError::ApiKeyMissing("openai".into()));
        }
        Ok(Self {
            model: model.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(&config.embedding_model, &config.base_url, &config.api_key)
    }
}

/// Vectors from an embeddings response, reordered by their `index` field.
pub fn parse_embedding_response(json: &Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| PersonaError::Embedding("No data in embedding response".into()))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = data
        .iter()
        .enumerate()
        .map(|(pos, item)| {
            let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
            let vector = item["embedding"]
                .as_array()
                .ok_or_else(|| PersonaError::Embedding("Embedding item without vector".into()))?
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()
                .ok_or_else(|| PersonaError::Embedding("Non-numeric embedding value".into()))?;
            Ok((index, vector))
        })
        .collect::<Result<_>>()?;

    if indexed.len() != expected {
        return Err(PersonaError::Embedding(format!(
            "expected {expected} embeddings, got {}",
            indexed.len()
        )));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| PersonaError::Embedding(format!("connection failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(PersonaError::Embedding(format!("API error {status}: {text}")));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| PersonaError::Embedding(e.to_string()))?;
        parse_embedding_response(&json, texts.len())
    }
}
