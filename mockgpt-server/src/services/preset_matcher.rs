use serde_json::Value;
use shared::{
    config::{MatchConditions, Preset},
    models::{ChatMessage, ChatRequest},
};

/// Returns the first preset whose conditions all hold for `request`.
pub fn find_preset<'a>(request: &ChatRequest, presets: &'a [Preset]) -> Option<&'a Preset> {
    presets.iter().find(|preset| {
        preset
            .match_conditions
            .as_ref()
            .is_none_or(|conditions| conditions_hold(request, conditions))
    })
}

// A condition of any other JSON type than the request field never holds.
fn conditions_hold(request: &ChatRequest, conditions: &MatchConditions) -> bool {
    conditions
        .model
        .as_ref()
        .is_none_or(|model| equals_text(request.model.as_deref(), model))
        && conditions
            .user
            .as_ref()
            .is_none_or(|user| equals_text(request.user.as_deref(), user))
        && conditions
            .stream
            .as_ref()
            .is_none_or(|stream| stream.as_bool() == Some(request.is_stream()))
        && conditions.messages.as_ref().is_none_or(|expected| {
            contains_all(request.messages.as_deref().unwrap_or_default(), expected)
        })
}

fn equals_text(actual: Option<&str>, expected: &Value) -> bool {
    actual.is_some_and(|actual| expected.as_str() == Some(actual))
}

// Subset match on (role, content); order and extra request messages are ignored.
fn contains_all(actual: &[ChatMessage], expected: &Value) -> bool {
    let Some(expected) = expected.as_array() else {
        return false;
    };
    expected.iter().all(|wanted| {
        actual.iter().any(|message| {
            wanted.get("role").and_then(Value::as_str) == Some(message.role.as_str())
                && wanted.get("content").unwrap_or(&Value::Null) == &message.content
        })
    })
}
