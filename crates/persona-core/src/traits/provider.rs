//! Chat-completion provider trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Message, ProviderResponse, ToolDefinition};

/// Per-request generation parameters.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub model: String,
    /// Left out of the request when `None` so the API default applies.
    pub temperature: Option<f32>,
}

/// A hosted chat-completion API with function calling.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// One synchronous round trip: full history plus tool schemas in,
    /// first choice out.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: &GenerateParams,
    ) -> Result<ProviderResponse>;
}
