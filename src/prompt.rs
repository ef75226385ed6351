use chrono::Utc;
use serde_json::{Value, json};

use crate::types::{Fact, StoredMessage, Summary};

/// Default persona installed for users without a stored system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a warm, attentive therapist. You listen carefully, remember what \
     the user has shared before, and respond with empathy and practical \
     support. Keep replies conversational and grounded in what you know \
     about the user.";

const ANALYSIS_SYSTEM_PROMPT: &str =
    "You are the therapist's assistant. You receive the user's stored facts, \
     their recent conversation history, and their current message. Summarize \
     what the therapist needs to know to respond well, citing the ids of the \
     facts you used. Record any new meaningful facts about the user, and \
     propose merging facts that clearly duplicate each other.";

/// Payload for the companion analysis call: facts, recent history, and the
/// current query are each delivered as a pseudo tool-call exchange so the
/// model treats them as retrieved context rather than conversation.
pub fn analysis_payload(user_message: &str, facts: &[Fact], history: &[StoredMessage]) -> Vec<Value> {
    let mut messages = vec![json!({"role": "system", "content": ANALYSIS_SYSTEM_PROMPT})];

    let facts_json = serde_json::to_string_pretty(facts).unwrap_or_else(|_| "[]".into());
    messages.extend(pseudo_tool_call("get_factology", &facts_json));

    let history_json = serde_json::to_string_pretty(history).unwrap_or_else(|_| "[]".into());
    messages.extend(pseudo_tool_call("get_recent_history", &history_json));

    messages.extend(pseudo_tool_call("get_current_user_query", user_message));

    messages
}

/// Payload for the main generation call: system prompt, stored summaries,
/// the companion model's context summary, current UTC time, the live
/// history, then the user's message.
pub fn generation_payload(
    system_prompt: &str,
    summaries: &[Summary],
    analysis_summary: Option<&str>,
    history: &[StoredMessage],
    user_message: &str,
) -> Vec<Value> {
    let mut messages = vec![json!({"role": "system", "content": system_prompt})];

    for summary in summaries {
        messages.push(json!({
            "role": "system",
            "content": format!("Previous conversation summary: {}", summary.content),
        }));
    }

    if let Some(summary) = analysis_summary {
        messages.extend(pseudo_tool_call("get_co_therapist_help", summary));
    }

    let now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    messages.extend(pseudo_tool_call(
        "get_current_time",
        &format!("Current UTC time is: {now}. Use this for context if needed."),
    ));

    for message in history {
        messages.push(json!({
            "role": message.role.as_str(),
            "content": message.content,
        }));
    }

    messages.push(json!({"role": "user", "content": user_message}));

    messages
}

/// An assistant tool-call plus its tool result, the shape chat-completions
/// providers expect for injected context.
fn pseudo_tool_call(name: &str, content: &str) -> [Value; 2] {
    let short_id: String = uuid::Uuid::new_v4().simple().to_string()[..10].to_string();
    let call_id = format!("call_{short_id}_{name}");
    [
        json!({
            "role": "assistant",
            "tool_calls": [{
                "id": call_id,
                "type": "function",
                "function": {"name": name, "arguments": "{}"},
            }],
        }),
        json!({
            "role": "tool",
            "tool_call_id": call_id,
            "name": name,
            "content": content,
        }),
    ]
}
