//! Conversation loop: one user turn through to one final answer.
//!
//! ```text
//!             ┌──── tool calls: run each in order, append results ───┐
//!             ▼                                                      │
//!   ─▶ AwaitingModel ── chat(messages, tools) ──────────────────────┤
//!                                                                    │
//!                         no tool calls ──▶ Done(answer)   ◀─────────┘
//! ```
//!
//! Tool rounds are capped; a model that keeps asking for tools past the cap
//! fails the turn with `ToolLimit` instead of spinning forever.

use persona_core::error::{PersonaError, Result};
use persona_core::traits::Provider;
use persona_core::traits::provider::GenerateParams;
use persona_core::types::{Message, ToolCall};
use persona_tools::ToolRegistry;
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    Done(String),
}

/// One tool call as it was executed during a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedCall {
    pub id: String,
    pub name: String,
    /// Parsed arguments, or the raw string when they were not valid JSON.
    pub arguments: Value,
    pub result: Value,
}

/// Outcome of a completed turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub answer: String,
    pub tool_calls: Vec<ExecutedCall>,
    /// Tool rounds used (model responses that requested tools).
    pub rounds: usize,
    /// Full message list at the end of the turn, system prompt included.
    pub messages: Vec<Message>,
}

pub struct ConversationLoop<'a> {
    provider: &'a dyn Provider,
    tools: &'a ToolRegistry,
    params: &'a GenerateParams,
    max_tool_rounds: usize,
}

impl<'a> ConversationLoop<'a> {
    pub fn new(
        provider: &'a dyn Provider,
        tools: &'a ToolRegistry,
        params: &'a GenerateParams,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            provider,
            tools,
            params,
            max_tool_rounds,
        }
    }

    /// Drive the state machine from `AwaitingModel` to `Done`.
    pub async fn run(&self, messages: Vec<Message>) -> Result<Turn> {
        let mut turn = Turn {
            answer: String::new(),
            tool_calls: Vec::new(),
            rounds: 0,
            messages,
        };
        let mut state = LoopState::AwaitingModel;

        loop {
            match state {
                LoopState::AwaitingModel => state = self.step(&mut turn).await?,
                LoopState::Done(answer) => {
                    turn.answer = answer;
                    return Ok(turn);
                }
            }
        }
    }

    async fn step(&self, turn: &mut Turn) -> Result<LoopState> {
        let definitions = self.tools.definitions();
        let response = self
            .provider
            .chat(&turn.messages, &definitions, self.params)
            .await?;

        if !response.requests_tools() {
            return Ok(LoopState::Done(response.content.unwrap_or_default()));
        }

        if turn.rounds >= self.max_tool_rounds {
            tracing::warn!(
                "Model still requesting tools after {} round(s), giving up",
                turn.rounds
            );
            return Err(PersonaError::ToolLimit(turn.rounds));
        }
        turn.rounds += 1;
        tracing::info!(
            "Tool round {}/{}: {} tool call(s)",
            turn.rounds,
            self.max_tool_rounds,
            response.tool_calls.len()
        );

        turn.messages.push(Message::assistant_tool_calls(
            response.content.unwrap_or_default(),
            response.tool_calls.clone(),
        ));

        for call in &response.tool_calls {
            let result = self.execute(call).await?;
            tracing::info!("Tool called: {}", call.function.name);
            turn.messages
                .push(Message::tool(serde_json::to_string(&result)?, &call.id));
            turn.tool_calls.push(ExecutedCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| Value::String(call.function.arguments.clone())),
                result,
            });
        }

        Ok(LoopState::AwaitingModel)
    }

    /// Run one call. Bad arguments become an error payload the model can read.
    async fn execute(&self, call: &ToolCall) -> Result<Value> {
        match self.tools.execute(call).await {
            Ok(value) => Ok(value),
            Err(e @ PersonaError::ToolArguments { .. }) => {
                tracing::warn!("{e}");
                Ok(json!({ "error": e.to_string() }))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_core::testing::{FakeEmbedder, RecordingNotifier, ScriptedProvider};
    use persona_core::types::{ProviderResponse, Role};
    use persona_knowledge::RetrievalIndex;
    use std::sync::Arc;

    fn params() -> GenerateParams {
        GenerateParams {
            model: "test-model".into(),
            temperature: None,
        }
    }

    fn registry() -> ToolRegistry {
        let index =
            RetrievalIndex::open_in_memory("profile", Arc::new(FakeEmbedder::default())).unwrap();
        ToolRegistry::new(
            "Ada",
            3,
            Arc::new(index),
            Arc::new(RecordingNotifier::new()),
        )
    }

    fn call(id: &str, name: &str, args: &str) -> ProviderResponse {
        ProviderResponse::with_tool_calls(vec![ToolCall::new(id, name, args)])
    }

    #[tokio::test]
    async fn test_plain_answer_finishes_in_one_call() {
        let provider = ScriptedProvider::new(vec![ProviderResponse::text("Hello!")]);
        let tools = registry();
        let params = params();
        let turn = ConversationLoop::new(&provider, &tools, &params, 5)
            .run(vec![Message::system("sys"), Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(turn.answer, "Hello!");
        assert_eq!(turn.rounds, 0);
        assert!(turn.tool_calls.is_empty());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_results_are_linked_and_fed_back() {
        let provider = ScriptedProvider::new(vec![
            ProviderResponse::with_tool_calls(vec![
                ToolCall::new("c1", "search_profile", r#"{"query":"job"}"#),
                ToolCall::new("c2", "made_up_tool", "{}"),
            ]),
            ProviderResponse::text("Done."),
        ]);
        let tools = registry();
        let params = params();
        let turn = ConversationLoop::new(&provider, &tools, &params, 5)
            .run(vec![Message::system("sys"), Message::user("job?")])
            .await
            .unwrap();

        assert_eq!(turn.answer, "Done.");
        assert_eq!(turn.rounds, 1);
        let names: Vec<&str> = turn.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["search_profile", "made_up_tool"]);
        assert_eq!(turn.tool_calls[1].result, json!({}));

        // Second request carries: system, user, assistant(tool_calls), tool, tool.
        let second = &provider.requests()[1];
        assert_eq!(second.len(), 5);
        assert!(second[2].has_tool_calls());
        assert_eq!(second[3].role, Role::Tool);
        assert_eq!(second[3].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(second[4].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(second[4].content, "{}");
        // Search result on an empty index is the JSON-encoded sentinel string.
        assert!(second[3].content.starts_with("\"No relevant information found in Ada's"));
    }

    #[tokio::test]
    async fn test_malformed_arguments_become_error_payload() {
        let provider = ScriptedProvider::new(vec![
            call("c1", "record_user_details", r#"{"name":"no email"}"#),
            ProviderResponse::text("Could you share your email?"),
        ]);
        let tools = registry();
        let params = params();
        let turn = ConversationLoop::new(&provider, &tools, &params, 5)
            .run(vec![Message::user("hi")])
            .await
            .unwrap();
        assert!(turn.tool_calls[0].result["error"]
            .as_str()
            .is_some_and(|e| e.contains("record_user_details")));
        assert_eq!(turn.answer, "Could you share your email?");
    }

    #[tokio::test]
    async fn test_tool_round_cap() {
        let provider =
            ScriptedProvider::always(call("loop", "record_unknown_question", r#"{"question":"?"}"#));
        let tools = registry();
        let params = params();
        let err = ConversationLoop::new(&provider, &tools, &params, 3)
            .run(vec![Message::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, PersonaError::ToolLimit(3)));
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_tool_calls_finish_reason_without_calls_is_final() {
        let provider = ScriptedProvider::new(vec![ProviderResponse {
            content: Some("odd but final".into()),
            finish_reason: Some("tool_calls".into()),
            ..Default::default()
        }]);
        let tools = registry();
        let params = params();
        let turn = ConversationLoop::new(&provider, &tools, &params, 5)
            .run(vec![Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(turn.answer, "odd but final");
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = ScriptedProvider::new(vec![]);
        let tools = registry();
        let params = params();
        let err = ConversationLoop::new(&provider, &tools, &params, 5)
            .run(vec![Message::user("hi")])
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }
}
