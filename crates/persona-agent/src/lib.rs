//! # Persona Agent
//! Answers questions in the voice of one person, grounded in their profile.
//!
//! ## Startup
//! 1. Validate config and check both profile documents exist (no network yet)
//! 2. Create chat + embedding clients and the push notifier
//! 3. Build (or reuse) the retrieval index
//! 4. Register the three tools over the shared index
//!
//! ## Per turn
//! widget history → filter + truncate → system prompt + history + user message
//! → [`ConversationLoop`] → [`Turn`]
//!
//! The agent holds no per-session state; every call carries its own history,
//! so one `Arc<Agent>` serves any number of concurrent sessions.

pub mod conversation;
pub mod history;
pub mod prompt;

use std::sync::Arc;

use persona_core::config::PersonaConfig;
use persona_core::error::Result;
use persona_core::traits::provider::GenerateParams;
use persona_core::traits::{Embedder, Notifier, Provider};
use persona_core::types::{Message, ToolDefinition};
use persona_knowledge::{BuildOutcome, RetrievalIndex};
use persona_tools::{PushoverNotifier, ToolRegistry};
use serde_json::Value;

pub use conversation::{ConversationLoop, ExecutedCall, LoopState, Turn};

pub struct Agent {
    config: PersonaConfig,
    provider: Arc<dyn Provider>,
    index: Arc<RetrievalIndex>,
    tools: ToolRegistry,
    system_prompt: String,
    params: GenerateParams,
}

impl Agent {
    /// Build the agent with the hosted OpenAI clients and Pushover.
    ///
    /// Missing profile documents fail here, before any client is created.
    pub async fn new(config: PersonaConfig) -> Result<Self> {
        config.validate()?;
        persona_knowledge::check_sources(&config)?;

        let provider = persona_providers::create_provider(&config)?;
        let embedder = persona_providers::create_embedder(&config)?;
        let notifier: Arc<dyn Notifier> = Arc::new(PushoverNotifier::from_config(&config.notify));
        if !notifier.is_enabled() {
            tracing::info!("Push notifications disabled (no Pushover credentials)");
        }

        Self::from_parts(config, provider, embedder, notifier).await
    }

    /// Build the agent around injected services.
    pub async fn from_parts(
        config: PersonaConfig,
        provider: Arc<dyn Provider>,
        embedder: Arc<dyn Embedder>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let (index, outcome) =
            persona_knowledge::build_profile_index(&config, embedder, false).await?;
        match outcome {
            BuildOutcome::Built { chunks } => {
                tracing::info!("📚 Profile index built ({chunks} chunks)")
            }
            BuildOutcome::Reused { chunks } => {
                tracing::info!("📚 Profile index loaded from cache ({chunks} chunks)")
            }
        }
        Ok(Self::with_index(config, provider, Arc::new(index), notifier))
    }

    /// Wire an agent over an index that is already built.
    pub fn with_index(
        config: PersonaConfig,
        provider: Arc<dyn Provider>,
        index: Arc<RetrievalIndex>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let tools = ToolRegistry::new(
            &config.identity.name,
            config.rag.retrieval_k,
            index.clone(),
            notifier,
        );
        let system_prompt = prompt::system_prompt(&config.identity.name);
        let params = GenerateParams {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
        };
        Self {
            config,
            provider,
            index,
            tools,
            system_prompt,
            params,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.identity.name
    }

    pub fn config(&self) -> &PersonaConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<RetrievalIndex> {
        &self.index
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    /// System prompt, truncated prior history, then the new user message.
    pub fn prepare_messages(&self, message: &str, history: Vec<Message>) -> Vec<Message> {
        let history = history::truncate_history(history, self.config.agent.max_history_turns);
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(history);
        messages.push(Message::user(message));
        messages
    }

    /// Run one turn with history in chat-widget form.
    pub async fn chat(&self, message: &str, history: &[Value]) -> Result<Turn> {
        self.chat_with_history(message, history::from_widget_history(history))
            .await
    }

    /// Run one turn with history already as chat messages.
    pub async fn chat_with_history(&self, message: &str, history: Vec<Message>) -> Result<Turn> {
        let messages = self.prepare_messages(message, history);
        tracing::debug!("Turn starts with {} message(s)", messages.len());
        ConversationLoop::new(
            self.provider.as_ref(),
            &self.tools,
            &self.params,
            self.config.agent.max_tool_rounds,
        )
        .run(messages)
        .await
    }

    /// Final answer text only.
    pub async fn respond(&self, message: &str, history: &[Value]) -> Result<String> {
        Ok(self.chat(message, history).await?.answer)
    }
}
