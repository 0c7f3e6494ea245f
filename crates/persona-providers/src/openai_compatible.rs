//! OpenAI-compatible chat-completions provider.
//!
//! Any endpoint speaking the `/chat/completions` wire format works; the base
//! URL and key come from `[llm]` in the config.

use async_trait::async_trait;
use persona_core::config::LlmConfig;
use persona_core::error::{PersonaError, Result};
use persona_core::traits::provider::{GenerateParams, Provider};
use persona_core::types::{FunctionCall, Message, ProviderResponse, ToolCall, ToolDefinition, Usage};
use serde_json::{Value, json};

const CHAT_PATH: &str = "/chat/completions";

pub struct OpenAiCompatibleProvider {
    name: String,
    api_key: String,
    /// e.g. "https://api.openai.com/v1", no trailing slash.
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(PersonaError::ApiKeyMissing(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new("openai", &config.base_url, &config.api_key)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.api_key))
    }
}

/// Request body in the chat-completions format.
pub fn build_chat_body(
    messages: &[Message],
    tools: &[ToolDefinition],
    params: &GenerateParams,
) -> Result<Value> {
    let mut body = json!({
        "model": params.model,
        "messages": serde_json::to_value(messages)?,
    });
    if let Some(t) = params.temperature {
        body["temperature"] = json!(t);
    }
    if !tools.is_empty() {
        let tool_defs: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = Value::Array(tool_defs);
    }
    Ok(body)
}

/// First choice of a chat-completions response.
pub fn parse_chat_response(json: &Value) -> Result<ProviderResponse> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| PersonaError::Provider("No choices in response".into()))?;

    let content = choice["message"]["content"].as_str().map(String::from);

    let tool_calls = choice["message"]["tool_calls"]
        .as_array()
        .map(|tc| {
            tc.iter()
                .filter_map(|t| {
                    Some(ToolCall {
                        id: t["id"].as_str().unwrap_or("").to_string(),
                        r#type: "function".to_string(),
                        function: FunctionCall {
                            name: t["function"]["name"].as_str()?.to_string(),
                            arguments: t["function"]["arguments"]
                                .as_str()
                                .unwrap_or("{}")
                                .to_string(),
                        },
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = json["usage"].as_object().map(|u| Usage {
        prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
    });

    Ok(ProviderResponse {
        content,
        tool_calls,
        finish_reason: choice["finish_reason"].as_str().map(String::from),
        usage,
    })
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: &GenerateParams,
    ) -> Result<ProviderResponse> {
        let body = build_chat_body(messages, tools, params)?;

        let url = format!("{}{}", self.base_url, CHAT_PATH);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        let req = self.apply_auth(req);

        let resp = req.send().await.map_err(|e| {
            PersonaError::Http(format!("{} connection failed ({}): {}", self.name, url, e))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(PersonaError::Provider(format!(
                "{} API error {}: {}",
                self.name, status, text
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| PersonaError::Http(e.to_string()))?;
        let parsed = parse_chat_response(&json)?;
        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                "{} usage: {} prompt + {} completion tokens",
                self.name,
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }
        Ok(parsed)
    }
}
