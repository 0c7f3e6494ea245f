//! Prior-turn history: import from the chat widget and truncation.

use persona_core::types::Message;
use serde_json::Value;

/// Plain text of a widget message body.
///
/// Accepts a string, or a multimodal list whose first text part wins
/// (`{"type": "text", "text": ...}` objects or bare strings).
pub fn extract_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .find_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("text") => {
                    Some(
                        obj.get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    )
                }
                _ => None,
            })
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Convert widget history (`[{role, content}, ...]`) to chat messages.
///
/// Only user and assistant entries with non-empty text survive.
pub fn from_widget_history(history: &[Value]) -> Vec<Message> {
    history
        .iter()
        .filter_map(|entry| {
            let role = entry.get("role")?.as_str()?;
            let content = extract_content(entry.get("content").unwrap_or(&Value::Null));
            if content.is_empty() {
                return None;
            }
            match role {
                "user" => Some(Message::user(content)),
                "assistant" => Some(Message::assistant(content)),
                _ => None,
            }
        })
        .collect()
}

/// Keep the last `max_turns` user/assistant pairs. Zero keeps everything.
pub fn truncate_history(mut messages: Vec<Message>, max_turns: usize) -> Vec<Message> {
    let keep = max_turns.saturating_mul(2);
    if max_turns == 0 || messages.len() <= keep {
        return messages;
    }
    messages.split_off(messages.len() - keep)
}
