//! Deterministic stand-ins for the external services.
//!
//! Enabled with the `testing` feature so sibling crates can share them in
//! their own tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{PersonaError, Result};
use crate::traits::provider::GenerateParams;
use crate::traits::{Embedder, Notifier, Provider};
use crate::types::{Message, ProviderResponse, ToolDefinition};

/// Hashed bag-of-words embedder. Texts sharing words land close together.
pub struct FakeEmbedder {
    dimension: usize,
    calls: AtomicUsize,
    fail: bool,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// An embedder whose every call fails like an unreachable API.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(8)
        }
    }

    /// Number of `embed` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            // FNV-1a
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for b in word.bytes() {
                hash ^= u64::from(b);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
            v[(hash % self.dimension as u64) as usize] += 1.0;
        }
        v
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str {
        "fake-bag-of-words"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PersonaError::Embedding("embedding service unreachable".into()));
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Replays queued responses and records every request it receives.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<Vec<Message>>>,
    repeat_last: Option<ProviderResponse>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    /// A provider that answers with the same response forever.
    pub fn always(response: ProviderResponse) -> Self {
        Self {
            repeat_last: Some(response),
            ..Default::default()
        }
    }

    /// Message lists sent so far, one per `chat` call.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
        _params: &GenerateParams,
    ) -> Result<ProviderResponse> {
        self.requests
            .lock()
            .map_err(|e| PersonaError::Other(e.to_string()))?
            .push(messages.to_vec());
        let next = self
            .responses
            .lock()
            .map_err(|e| PersonaError::Other(e.to_string()))?
            .pop_front();
        next.or_else(|| self.repeat_last.clone())
            .ok_or_else(|| PersonaError::Provider("script exhausted".into()))
    }
}

/// Keeps every notification text instead of sending it.
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    enabled: bool,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            enabled: true,
            fail: false,
        }
    }

    /// A notifier whose transport always errors.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// A notifier without credentials.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, text: &str) -> Result<()> {
        if self.fail {
            return Err(PersonaError::Http("push endpoint unreachable".into()));
        }
        self.sent
            .lock()
            .map_err(|e| PersonaError::Other(e.to_string()))?
            .push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::notifier::notify_best_effort;

    #[tokio::test]
    async fn test_fake_embedder_is_deterministic() {
        let e = FakeEmbedder::new(16);
        let a = e.embed_one("Rust engineer at Acme").await.unwrap();
        let b = e.embed_one("rust ENGINEER at acme").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_eq!(e.calls(), 2);
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failures() {
        let failing = RecordingNotifier::failing();
        notify_best_effort(&failing, "hello").await;
        assert!(failing.sent().is_empty());

        let disabled = RecordingNotifier::disabled();
        notify_best_effort(&disabled, "hello").await;
        assert!(disabled.sent().is_empty());

        let ok = RecordingNotifier::new();
        notify_best_effort(&ok, "hello").await;
        assert_eq!(ok.sent(), vec!["hello".to_string()]);
    }
}
