//! Tool registry: the profile tools, their schemas and dispatch.
//!
//! Tool names map onto a closed [`Operation`] enum. Parsing happens once,
//! against structs that reject unknown fields, and execution is a single
//! exhaustive match.

use std::sync::Arc;

use persona_core::error::{PersonaError, Result};
use persona_core::traits::Notifier;
use persona_core::traits::notifier::notify_best_effort;
use persona_core::types::{ToolCall, ToolDefinition};
use persona_knowledge::RetrievalIndex;
use serde::Deserialize;
use serde_json::{Value, json};

/// Every tool the model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    SearchProfile,
    RecordUserDetails,
    RecordUnknownQuestion,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [
        ToolName::SearchProfile,
        ToolName::RecordUserDetails,
        ToolName::RecordUnknownQuestion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::SearchProfile => "search_profile",
            ToolName::RecordUserDetails => "record_user_details",
            ToolName::RecordUnknownQuestion => "record_unknown_question",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchArgs {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserDetails {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl UserDetails {
    pub fn name_or_default(&self) -> &str {
        self.name.as_deref().unwrap_or("Name not provided")
    }

    pub fn notes_or_default(&self) -> &str {
        self.notes.as_deref().unwrap_or("not provided")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnknownQuestion {
    pub question: String,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    SearchProfile(SearchArgs),
    RecordUserDetails(UserDetails),
    RecordUnknownQuestion(UnknownQuestion),
}

impl Operation {
    /// Parse a model-issued call. `Ok(None)` means the name is not a tool.
    pub fn parse(name: &str, arguments: &str) -> Result<Option<Operation>> {
        let Some(tool) = ToolName::parse(name) else {
            return Ok(None);
        };
        let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
        let bad_args = |e: serde_json::Error| PersonaError::ToolArguments {
            tool: name.to_string(),
            reason: e.to_string(),
        };

        let op = match tool {
            ToolName::SearchProfile => {
                Operation::SearchProfile(serde_json::from_str(raw).map_err(bad_args)?)
            }
            ToolName::RecordUserDetails => {
                Operation::RecordUserDetails(serde_json::from_str(raw).map_err(bad_args)?)
            }
            ToolName::RecordUnknownQuestion => {
                Operation::RecordUnknownQuestion(serde_json::from_str(raw).map_err(bad_args)?)
            }
        };
        Ok(Some(op))
    }

    pub fn tool(&self) -> ToolName {
        match self {
            Operation::SearchProfile(_) => ToolName::SearchProfile,
            Operation::RecordUserDetails(_) => ToolName::RecordUserDetails,
            Operation::RecordUnknownQuestion(_) => ToolName::RecordUnknownQuestion,
        }
    }
}

/// Declares the tools to the model and runs them.
pub struct ToolRegistry {
    person_name: String,
    retrieval_k: usize,
    index: Arc<RetrievalIndex>,
    notifier: Arc<dyn Notifier>,
}

impl ToolRegistry {
    pub fn new(
        person_name: &str,
        retrieval_k: usize,
        index: Arc<RetrievalIndex>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            person_name: person_name.to_string(),
            retrieval_k,
            index,
            notifier,
        }
    }

    /// Schemas sent with every chat request, in a fixed order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolName::ALL.iter().map(|t| self.definition(*t)).collect()
    }

    fn definition(&self, tool: ToolName) -> ToolDefinition {
        let name = &self.person_name;
        let (description, parameters) = match tool {
            ToolName::SearchProfile => (
                format!(
                    "Search {name}'s summary and resume for relevant information. \
                     Use this before answering questions about {name}."
                ),
                json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query - what you need to find out about the person"
                        }
                    },
                    "required": ["query"],
                    "additionalProperties": false
                }),
            ),
            ToolName::RecordUserDetails => (
                "Use this tool to record that a user is interested in being in touch \
                 and provided an email address"
                    .to_string(),
                json!({
                    "type": "object",
                    "properties": {
                        "email": { "type": "string", "description": "The email address of this user" },
                        "name": { "type": "string", "description": "The user's name, if they provided it" },
                        "notes": {
                            "type": "string",
                            "description": "Any additional information about the conversation"
                        }
                    },
                    "required": ["email"],
                    "additionalProperties": false
                }),
            ),
            ToolName::RecordUnknownQuestion => (
                "Always use this tool to record any question that couldn't be answered \
                 as you didn't know the answer"
                    .to_string(),
                json!({
                    "type": "object",
                    "properties": {
                        "question": {
                            "type": "string",
                            "description": "The question that couldn't be answered"
                        }
                    },
                    "required": ["question"],
                    "additionalProperties": false
                }),
            ),
        };
        ToolDefinition {
            name: tool.as_str().to_string(),
            description,
            parameters,
        }
    }

    /// Execute one call. Unknown tool names yield `{}`.
    ///
    /// Malformed arguments come back as `ToolArguments`; retrieval failures
    /// propagate unchanged.
    pub async fn execute(&self, call: &ToolCall) -> Result<Value> {
        match Operation::parse(&call.function.name, &call.function.arguments)? {
            Some(op) => self.run(op).await,
            None => {
                tracing::warn!("Model called unknown tool '{}'", call.function.name);
                Ok(json!({}))
            }
        }
    }

    pub async fn run(&self, op: Operation) -> Result<Value> {
        tracing::debug!("Running tool {}", op.tool().as_str());
        match op {
            Operation::SearchProfile(args) => {
                let found = self.index.query(&args.query, self.retrieval_k).await?;
                if found.is_empty() {
                    Ok(Value::String(format!(
                        "No relevant information found in {}'s profile for that query.",
                        self.person_name
                    )))
                } else {
                    Ok(Value::String(found))
                }
            }
            Operation::RecordUserDetails(details) => {
                let text = format!(
                    "Recording {} with email {} and notes {}",
                    details.name_or_default(),
                    details.email,
                    details.notes_or_default()
                );
                notify_best_effort(self.notifier.as_ref(), &text).await;
                Ok(json!({ "recorded": "ok" }))
            }
            Operation::RecordUnknownQuestion(q) => {
                notify_best_effort(self.notifier.as_ref(), &format!("Recording {}", q.question))
                    .await;
                Ok(json!({ "recorded": "ok" }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_core::testing::{FakeEmbedder, RecordingNotifier};
    use persona_knowledge::{Chunk, ChunkConfig, Provenance};

    async fn registry_with(
        texts: &[&str],
        notifier: Arc<RecordingNotifier>,
    ) -> ToolRegistry {
        let mut index =
            RetrievalIndex::open_in_memory("profile", Arc::new(FakeEmbedder::default())).unwrap();
        let chunks: Vec<Chunk> = texts
            .iter()
            .map(|t| Chunk {
                text: t.to_string(),
                provenance: Provenance::Resume,
                page: Some(1),
            })
            .collect();
        if !chunks.is_empty() {
            index.build(&chunks, ChunkConfig::default(), false).await.unwrap();
        }
        ToolRegistry::new("Ada", 2, Arc::new(index), notifier)
    }

    #[test]
    fn test_tool_names_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::parse("delete_everything"), None);
    }

    #[test]
    fn test_parse_rejects_undeclared_fields() {
        let err = Operation::parse("search_profile", r#"{"query":"x","limit":3}"#).unwrap_err();
        assert!(matches!(err, PersonaError::ToolArguments { ref tool, .. } if tool == "search_profile"));
        assert!(Operation::parse("record_user_details", r#"{"name":"Bo"}"#).is_err());
        assert!(Operation::parse("record_unknown_question", "not json").is_err());
    }

    #[test]
    fn test_parse_unknown_tool_is_none() {
        assert_eq!(Operation::parse("launch_rockets", "{garbage").unwrap(), None);
    }

    #[test]
    fn test_user_details_defaults() {
        let op = Operation::parse("record_user_details", r#"{"email":"a@b.com"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(op.tool(), ToolName::RecordUserDetails);
        let Operation::RecordUserDetails(details) = op else {
            panic!("wrong operation");
        };
        assert_eq!(details.name_or_default(), "Name not provided");
        assert_eq!(details.notes_or_default(), "not provided");
    }

    #[tokio::test]
    async fn test_definitions_are_strict() {
        let registry = registry_with(&[], Arc::new(RecordingNotifier::new())).await;
        let defs = registry.definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["search_profile", "record_user_details", "record_unknown_question"]
        );
        for def in &defs {
            assert_eq!(def.parameters["additionalProperties"], false);
            assert!(def.parameters["required"].as_array().is_some_and(|r| !r.is_empty()));
        }
        assert!(defs[0].description.contains("Ada's summary and resume"));
        assert_eq!(defs[1].parameters["required"], json!(["email"]));
    }

    #[tokio::test]
    async fn test_unknown_tool_returns_empty_object() {
        let registry = registry_with(&[], Arc::new(RecordingNotifier::new())).await;
        let result = registry
            .execute(&ToolCall::new("c1", "hallucinated_tool", "{}"))
            .await
            .unwrap();
        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn test_search_on_empty_index_returns_sentinel() {
        let registry = registry_with(&[], Arc::new(RecordingNotifier::new())).await;
        let result = registry
            .execute(&ToolCall::new("c1", "search_profile", r#"{"query":"current job"}"#))
            .await
            .unwrap();
        assert_eq!(
            result,
            Value::String("No relevant information found in Ada's profile for that query.".into())
        );
    }

    #[tokio::test]
    async fn test_search_returns_top_chunks() {
        let registry = registry_with(
            &[
                "Current job: staff engineer at Acme",
                "Hobbies include sailing",
                "Education: maths at Cambridge",
            ],
            Arc::new(RecordingNotifier::new()),
        )
        .await;
        let result = registry
            .execute(&ToolCall::new("c1", "search_profile", r#"{"query":"current job engineer"}"#))
            .await
            .unwrap();
        let text = result.as_str().unwrap();
        assert!(text.starts_with("Current job"));
        assert_eq!(text.split(persona_knowledge::CHUNK_SEPARATOR).count(), 2);
    }

    #[tokio::test]
    async fn test_record_tools_notify_and_ack() {
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = registry_with(&[], notifier.clone()).await;

        let ack = registry
            .execute(&ToolCall::new(
                "c1",
                "record_user_details",
                r#"{"email":"a@b.com","name":"Bo"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(ack, json!({"recorded": "ok"}));

        registry
            .execute(&ToolCall::new(
                "c2",
                "record_unknown_question",
                r#"{"question":"Favourite colour?"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(
            notifier.sent(),
            vec![
                "Recording Bo with email a@b.com and notes not provided".to_string(),
                "Recording Favourite colour?".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_record_succeeds_when_notifier_fails() {
        let registry = registry_with(&[], Arc::new(RecordingNotifier::failing())).await;
        let ack = registry
            .execute(&ToolCall::new("c1", "record_unknown_question", r#"{"question":"?"}"#))
            .await
            .unwrap();
        assert_eq!(ack, json!({"recorded": "ok"}));
    }
}
