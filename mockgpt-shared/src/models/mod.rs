pub mod chat;
pub mod errors;

pub use chat::{
    ChatCompletion, ChatCompletionChunk, ChatMessage, ChatRequest, ChunkChoice, ChunkDelta,
    CompletionChoice, CompletionMessage, FinishReason, FunctionCall, FunctionDelta,
    OBJECT_CHUNK, OBJECT_COMPLETION, ROLE_ASSISTANT, ToolCall, ToolCallDelta, Usage,
};
pub use errors::{ErrorBody, ErrorEnvelope, ErrorKind};
