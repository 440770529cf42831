//! Builds mock replies: preset literals, preset chunk replays, or synthesized
//! `chat.completion` objects.

use serde_json::Value;
use shared::{
    config::{MockConfig, Preset},
    models::{ChatCompletion, ChatRequest, CompletionMessage, FunctionCall, ToolCall, Usage},
};
use uuid::Uuid;

pub const DEFAULT_TOOL_NAME: &str = "default_tool";
pub const DEFAULT_FUNCTION_NAME: &str = "default_function";
pub const EMPTY_ARGUMENTS: &str = "{}";

const PROMPT_TOKENS: u32 = 100;
const CALL_COMPLETION_TOKENS: u32 = 50;
const TEXT_COMPLETION_TOKENS: u32 = 20;
const COMPLETION_ID_LEN: usize = 28;
const TOOL_CALL_ID_LEN: usize = 16;

/// What the mock pipeline answers with; the router decides the framing.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// A preset `response`, returned verbatim.
    Literal(Value),
    /// Preset `stream_response_chunks`, replayed in order.
    Chunks(Vec<Value>),
    Completion(ChatCompletion),
}

/// Resolves the reply for a validated request and its matched preset, if any.
pub fn mock_reply(
    request: &ChatRequest,
    preset: Option<&Preset>,
    defaults: &MockConfig,
) -> MockReply {
    if let Some(preset) = preset {
        if request.is_stream()
            && let Some(chunks) = preset.stream_chunks()
        {
            return MockReply::Chunks(chunks.to_vec());
        }
        if let Some(response) = preset.literal_response() {
            return MockReply::Literal(response.clone());
        }
    }

    MockReply::Completion(synthesize(request, defaults))
}

/// Synthesizes a completion; tool calls win over legacy function calls, which
/// win over plain text.
pub fn synthesize(request: &ChatRequest, defaults: &MockConfig) -> ChatCompletion {
    let model = request
        .model_name()
        .unwrap_or(defaults.default_model.as_str())
        .to_string();

    let (message, completion_tokens) = if let Some(tools) = requested_tools(request) {
        let call = ToolCall {
            id: format!("toolcall-{}", uuid_prefix(TOOL_CALL_ID_LEN)),
            kind: "function".to_string(),
            function: FunctionCall {
                name: tool_name(tools).to_string(),
                arguments: EMPTY_ARGUMENTS.to_string(),
            },
        };
        (CompletionMessage::ToolCalls(vec![call]), CALL_COMPLETION_TOKENS)
    } else if let Some(call) = request.function_call.as_ref().filter(|value| is_truthy(value)) {
        (
            CompletionMessage::FunctionCall(legacy_function_call(call)),
            CALL_COMPLETION_TOKENS,
        )
    } else {
        (
            CompletionMessage::Text(defaults.default_content.clone()),
            TEXT_COMPLETION_TOKENS,
        )
    };

    ChatCompletion::single(
        format!("chatcmpl-{}", uuid_prefix(COMPLETION_ID_LEN)),
        chrono::Utc::now().timestamp(),
        model,
        message,
        Usage::new(PROMPT_TOKENS, completion_tokens),
    )
}

fn requested_tools(request: &ChatRequest) -> Option<&[Value]> {
    if !request.tool_choice.as_ref().is_some_and(is_truthy) {
        return None;
    }
    request.tools.as_deref().filter(|tools| !tools.is_empty())
}

fn tool_name(tools: &[Value]) -> &str {
    tools
        .iter()
        .find(|tool| tool.get("type").and_then(Value::as_str) == Some("function"))
        .and_then(|tool| tool.pointer("/function/name"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TOOL_NAME)
}

fn legacy_function_call(value: &Value) -> FunctionCall {
    let Some(object) = value.as_object() else {
        return FunctionCall {
            name: DEFAULT_FUNCTION_NAME.to_string(),
            arguments: EMPTY_ARGUMENTS.to_string(),
        };
    };

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_FUNCTION_NAME);
    let arguments = match object.get("arguments") {
        None | Some(Value::Null) => EMPTY_ARGUMENTS.to_string(),
        Some(Value::String(arguments)) => arguments.clone(),
        Some(other) => other.to_string(),
    };

    FunctionCall {
        name: name.to_string(),
        arguments,
    }
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn uuid_prefix(len: usize) -> String {
    Uuid::new_v4().to_string().chars().take(len).collect()
}
