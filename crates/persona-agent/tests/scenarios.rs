//! End-to-end turns against scripted model responses and a real on-disk index.

use std::path::Path;
use std::sync::Arc;

use persona_agent::Agent;
use persona_core::PersonaConfig;
use persona_core::PersonaError;
use persona_core::testing::{FakeEmbedder, RecordingNotifier, ScriptedProvider};
use persona_core::types::{ProviderResponse, Role, ToolCall};
use serde_json::{Value, json};

const SUMMARY: &str =
    "I am a backend engineer who loves distributed systems. I mentor junior developers.";
const RESUME: &str = "Ada Example\n\nExperience\n\nCurrent job: Staff Engineer at Acme Payments \
    since 2021, leading the ledger platform team.\n\nPrevious: Software Engineer at Initech, \
    2016 to 2021.\n\nEducation\n\nBSc Computer Science, University of Somewhere.";

fn write_profile(dir: &Path) {
    std::fs::create_dir_all(dir.join("me")).unwrap();
    std::fs::write(dir.join("me/summary.txt"), SUMMARY).unwrap();
    std::fs::write(dir.join("me/resume.txt"), RESUME).unwrap();
}

fn config_in(dir: &Path) -> PersonaConfig {
    let mut config = PersonaConfig::default();
    config.identity.name = "Ada".into();
    config.documents.base_dir = dir.to_string_lossy().into_owned();
    config.documents.resume_path = "me/resume.txt".into();
    config.rag.chunk_size = 200;
    config.rag.chunk_overlap = 40;
    config.rag.retrieval_k = 2;
    config
}

struct Harness {
    _dir: tempfile::TempDir,
    agent: Agent,
    provider: Arc<ScriptedProvider>,
    notifier: Arc<RecordingNotifier>,
}

async fn harness(script: Vec<ProviderResponse>, tweak: impl FnOnce(&mut PersonaConfig)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    write_profile(dir.path());
    let mut config = config_in(dir.path());
    tweak(&mut config);

    let provider = Arc::new(ScriptedProvider::new(script));
    let notifier = Arc::new(RecordingNotifier::new());
    let agent = Agent::from_parts(
        config,
        provider.clone(),
        Arc::new(FakeEmbedder::default()),
        notifier.clone(),
    )
    .await
    .unwrap();
    Harness {
        _dir: dir,
        agent,
        provider,
        notifier,
    }
}

fn tool_call(id: &str, name: &str, args: Value) -> ProviderResponse {
    ProviderResponse::with_tool_calls(vec![ToolCall::new(id, name, &args.to_string())])
}

#[tokio::test]
async fn current_job_question_searches_before_answering() {
    let h = harness(
        vec![
            tool_call("call_1", "search_profile", json!({"query": "current job"})),
            ProviderResponse::text("I'm a Staff Engineer at Acme Payments."),
        ],
        |_| {},
    )
    .await;

    let turn = h.agent.chat("What is your current job?", &[]).await.unwrap();

    assert_eq!(turn.tool_calls.len(), 1);
    assert_eq!(turn.tool_calls[0].name, "search_profile");
    assert_eq!(turn.answer, "I'm a Staff Engineer at Acme Payments.");
    assert!(!turn.messages.last().unwrap().has_tool_calls());

    // The model saw retrieved resume text before answering.
    let second = &h.provider.requests()[1];
    let tool_msg = second.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    assert!(tool_msg.content.contains("Acme Payments"));
}

#[tokio::test]
async fn shared_email_is_recorded() {
    let h = harness(
        vec![
            tool_call(
                "call_1",
                "record_user_details",
                json!({"email": "a@b.com", "notes": "wants to chat about a role"}),
            ),
            ProviderResponse::text("Thanks, I'll be in touch!"),
        ],
        |_| {},
    )
    .await;

    let turn = h
        .agent
        .chat("Great talking, contact me at a@b.com", &[])
        .await
        .unwrap();

    let recorded = turn
        .tool_calls
        .iter()
        .find(|c| c.name == "record_user_details")
        .unwrap();
    assert_eq!(recorded.arguments["email"], "a@b.com");
    assert_eq!(recorded.result, json!({"recorded": "ok"}));
    assert_eq!(
        h.notifier.sent(),
        vec![
            "Recording Name not provided with email a@b.com and notes wants to chat about a role"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn history_is_truncated_to_recent_pairs() {
    let h = harness(vec![ProviderResponse::text("ok")], |c| {
        c.agent.max_history_turns = 2;
    })
    .await;

    let history: Vec<Value> = (0..5)
        .flat_map(|i| {
            [
                json!({"role": "user", "content": format!("question {i}")}),
                json!({"role": "assistant", "content": format!("answer {i}")}),
            ]
        })
        .collect();
    h.agent.chat("next", &history).await.unwrap();

    let sent = &h.provider.requests()[0];
    let contents: Vec<&str> = sent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(sent.len(), 6);
    assert_eq!(sent[0].role, Role::System);
    assert_eq!(
        &contents[1..],
        &["question 3", "answer 3", "question 4", "answer 4", "next"]
    );
}

#[tokio::test]
async fn hallucinated_tool_gets_empty_object() {
    let h = harness(
        vec![
            tool_call("call_1", "book_meeting", json!({"when": "tomorrow"})),
            ProviderResponse::text("Let's keep chatting here."),
        ],
        |_| {},
    )
    .await;

    let turn = h.agent.chat("Book a meeting", &[]).await.unwrap();
    assert_eq!(turn.tool_calls[0].result, json!({}));
    assert_eq!(turn.answer, "Let's keep chatting here.");
}

#[tokio::test]
async fn missing_resume_fails_before_any_network_call() {
    let dir = tempfile::tempdir().unwrap();
    write_profile(dir.path());
    let mut config = config_in(dir.path());
    config.documents.resume_path = "me/does-not-exist.pdf".into();

    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let embedder = Arc::new(FakeEmbedder::default());
    let result = Agent::from_parts(
        config.clone(),
        provider.clone(),
        embedder.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .await;

    let Err(err) = result else {
        panic!("agent started without a resume");
    };
    assert!(matches!(err, PersonaError::NotFound { ref what, .. } if what == "Resume PDF"));
    assert_eq!(embedder.calls(), 0);
    assert_eq!(provider.call_count(), 0);

    // The hosted constructor checks documents before it even wants an API key.
    let Err(err) = Agent::new(config).await else {
        panic!("agent started without a resume");
    };
    assert!(matches!(err, PersonaError::NotFound { .. }));
}
