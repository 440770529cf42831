use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const OBJECT_COMPLETION: &str = "chat.completion";
pub const OBJECT_CHUNK: &str = "chat.completion.chunk";
pub const ROLE_ASSISTANT: &str = "assistant";

/// Inbound body of `POST /v1/chat/completions`.
///
/// Only the fields the engine inspects are typed; everything else is kept in
/// `extra` so a request can be forwarded upstream without losing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    /// Effective stream flag; an absent `stream` field means a single JSON reply.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Returns the model name when it is present and non-empty.
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().filter(|model| !model.is_empty())
    }

    /// Returns the message list when it is present and non-empty.
    #[must_use]
    pub fn message_list(&self) -> Option<&[ChatMessage]> {
        self.messages
            .as_deref()
            .filter(|messages| !messages.is_empty())
    }
}

/// A single chat message in the conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender (e.g., "user", "assistant").
    pub role: String,
    /// Text content, `null`, or structured content parts.
    #[serde(default)]
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    FunctionCall,
}

impl FinishReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::ToolCalls => "tool_calls",
            Self::FunctionCall => "function_call",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as the vendor sends them.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// The assistant message of a synthesized completion.
///
/// The shape is decided once, when the completion is built, and every later
/// stage (JSON reply, SSE framing) dispatches on this variant instead of
/// probing for optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "MessageWire", try_from = "MessageWire")]
pub enum CompletionMessage {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    FunctionCall(FunctionCall),
}

impl CompletionMessage {
    #[must_use]
    pub const fn finish_reason(&self) -> FinishReason {
        match self {
            Self::Text(_) => FinishReason::Stop,
            Self::ToolCalls(_) => FinishReason::ToolCalls,
            Self::FunctionCall(_) => FinishReason::FunctionCall,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageWire {
    role: String,
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

impl From<CompletionMessage> for MessageWire {
    fn from(message: CompletionMessage) -> Self {
        let role = ROLE_ASSISTANT.to_string();
        match message {
            CompletionMessage::Text(content) => Self {
                role,
                content: Some(content),
                tool_calls: None,
                function_call: None,
            },
            CompletionMessage::ToolCalls(calls) => Self {
                role,
                content: None,
                tool_calls: Some(calls),
                function_call: None,
            },
            CompletionMessage::FunctionCall(call) => Self {
                role,
                content: None,
                tool_calls: None,
                function_call: Some(call),
            },
        }
    }
}

impl TryFrom<MessageWire> for CompletionMessage {
    type Error = String;

    fn try_from(wire: MessageWire) -> Result<Self, Self::Error> {
        match (wire.tool_calls, wire.function_call, wire.content) {
            (Some(calls), _, _) if !calls.is_empty() => Ok(Self::ToolCalls(calls)),
            (_, Some(call), _) => Ok(Self::FunctionCall(call)),
            (_, _, Some(content)) => Ok(Self::Text(content)),
            _ => Err("assistant message carries neither content nor a call".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    #[must_use]
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: CompletionMessage,
    pub finish_reason: FinishReason,
}

/// Non-streamed `chat.completion` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

impl ChatCompletion {
    /// Builds a single-choice completion; the finish reason follows the message kind.
    #[must_use]
    pub fn single(
        id: String,
        created: i64,
        model: String,
        message: CompletionMessage,
        usage: Usage,
    ) -> Self {
        let finish_reason = message.finish_reason();
        Self {
            id,
            object: OBJECT_COMPLETION.to_string(),
            created,
            model,
            choices: vec![CompletionChoice {
                index: 0,
                message,
                finish_reason,
            }],
            usage,
        }
    }

    /// The message of the first (and only) choice.
    #[must_use]
    pub fn message(&self) -> Option<&CompletionMessage> {
        self.choices.first().map(|choice| &choice.message)
    }

    /// A chunk skeleton carrying this completion's correlation fields.
    #[must_use]
    pub fn chunk(
        &self,
        delta: ChunkDelta,
        finish_reason: Option<FinishReason>,
    ) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: OBJECT_CHUNK.to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}

/// One `chat.completion.chunk` event of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    /// Serialized as `null` until the closing chunk.
    pub finish_reason: Option<FinishReason>,
}

/// Incremental fields introduced by one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionDelta>,
}

impl ChunkDelta {
    #[must_use]
    pub fn assistant() -> Self {
        Self {
            role: Some(ROLE_ASSISTANT.to_string()),
            ..Self::default()
        }
    }
}

/// Partial tool call; follow-up chunks carry only `index` and `function.arguments`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub function: FunctionDelta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub arguments: String,
}
