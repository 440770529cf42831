//! Server-sent event framing for streamed completions.
//!
//! Frames come from a lazy iterator and are pushed one at a time into a bounded
//! channel by a spawned producer; the HTTP body drains the channel as frames
//! arrive. Every stream ends with exactly one `data: [DONE]` frame.

use std::{convert::Infallible, iter, time::Duration};

use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use shared::{
    config::server::StreamingConfig,
    models::{
        ChatCompletion, ChatCompletionChunk, ChunkDelta, CompletionMessage, FinishReason,
        FunctionDelta, ToolCallDelta,
    },
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

const DONE_SENTINEL: &str = "[DONE]";
const DATA_PREFIX: &str = "data:";

/// One complete SSE event, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame(String);

impl SseFrame {
    pub fn data(payload: &str) -> Self {
        Self(format!("data: {payload}\n\n"))
    }

    pub fn done() -> Self {
        Self::data(DONE_SENTINEL)
    }

    /// Compact JSON payload.
    ///
    /// # Errors
    /// Returns an error if `value` cannot be serialized.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::data(&serde_json::to_string(value)?))
    }

    /// An already-enveloped line, such as one relayed from an upstream stream.
    pub fn line(line: &str) -> Self {
        Self(format!("{line}\n\n"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Delay inserted between consecutive frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacingPolicy {
    delay: Duration,
}

impl PacingPolicy {
    pub const fn none() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    pub const fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub const fn from_config(config: &StreamingConfig) -> Self {
        Self::fixed(Duration::from_micros(config.chunk_delay_micros))
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Opening,
    Body,
    Closing,
    Finished,
}

#[derive(Debug, Clone)]
enum DeltaShape {
    Text,
    Tool { id: String, name: String },
    Function { name: String },
}

/// Chunks of a synthesized completion: an opening chunk carrying the role, one
/// chunk per character of the content or arguments, and a closing chunk with
/// the finish reason.
#[derive(Debug, Clone)]
pub struct CompletionChunks {
    completion: ChatCompletion,
    shape: DeltaShape,
    body: String,
    offset: usize,
    finish_reason: FinishReason,
    phase: Phase,
}

impl CompletionChunks {
    pub fn new(completion: ChatCompletion) -> Self {
        let (shape, body) = match completion.message() {
            Some(CompletionMessage::Text(content)) => (DeltaShape::Text, content.clone()),
            Some(CompletionMessage::ToolCalls(calls)) => match calls.first() {
                Some(call) => (
                    DeltaShape::Tool {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                    },
                    call.function.arguments.clone(),
                ),
                None => (DeltaShape::Text, String::new()),
            },
            Some(CompletionMessage::FunctionCall(call)) => (
                DeltaShape::Function {
                    name: call.name.clone(),
                },
                call.arguments.clone(),
            ),
            None => (DeltaShape::Text, String::new()),
        };
        let finish_reason = completion
            .choices
            .first()
            .map_or(FinishReason::Stop, |choice| choice.finish_reason);

        Self {
            completion,
            shape,
            body,
            offset: 0,
            finish_reason,
            phase: Phase::Opening,
        }
    }

    fn opening_delta(&self) -> ChunkDelta {
        let mut delta = ChunkDelta::assistant();
        match &self.shape {
            DeltaShape::Text => {}
            DeltaShape::Tool { id, name } => {
                delta.tool_calls = Some(vec![ToolCallDelta {
                    index: 0,
                    id: Some(id.clone()),
                    kind: Some("function".to_string()),
                    function: FunctionDelta {
                        name: Some(name.clone()),
                        arguments: String::new(),
                    },
                }]);
            }
            DeltaShape::Function { name } => {
                delta.function_call = Some(FunctionDelta {
                    name: Some(name.clone()),
                    arguments: String::new(),
                });
            }
        }
        delta
    }

    fn piece_delta(&self, piece: String) -> ChunkDelta {
        match self.shape {
            DeltaShape::Text => ChunkDelta {
                content: Some(piece),
                ..ChunkDelta::default()
            },
            DeltaShape::Tool { .. } => ChunkDelta {
                tool_calls: Some(vec![ToolCallDelta {
                    index: 0,
                    function: FunctionDelta {
                        name: None,
                        arguments: piece,
                    },
                    ..ToolCallDelta::default()
                }]),
                ..ChunkDelta::default()
            },
            DeltaShape::Function { .. } => ChunkDelta {
                function_call: Some(FunctionDelta {
                    name: None,
                    arguments: piece,
                }),
                ..ChunkDelta::default()
            },
        }
    }
}

impl Iterator for CompletionChunks {
    type Item = ChatCompletionChunk;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.phase {
                Phase::Opening => {
                    self.phase = Phase::Body;
                    return Some(self.completion.chunk(self.opening_delta(), None));
                }
                Phase::Body => {
                    if let Some(piece) = self.body[self.offset..].chars().next() {
                        self.offset += piece.len_utf8();
                        let delta = self.piece_delta(piece.to_string());
                        return Some(self.completion.chunk(delta, None));
                    }
                    self.phase = Phase::Closing;
                }
                Phase::Closing => {
                    self.phase = Phase::Finished;
                    return Some(
                        self.completion
                            .chunk(ChunkDelta::default(), Some(self.finish_reason)),
                    );
                }
                Phase::Finished => return None,
            }
        }
    }
}

/// Frames for a synthesized completion, terminated by `[DONE]`.
pub fn completion_frames(completion: ChatCompletion) -> impl Iterator<Item = SseFrame> + Send {
    CompletionChunks::new(completion)
        .filter_map(|chunk| match SseFrame::json(&chunk) {
            Ok(frame) => Some(frame),
            Err(err) => {
                warn!(error = %err, "failed to encode completion chunk");
                None
            }
        })
        .chain(iter::once(SseFrame::done()))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedChunk {
    #[error("chunk is neither a string nor an object")]
    UnsupportedType,
    #[error("chunk is empty")]
    Empty,
    #[error("chunk contains a blank line")]
    EmbeddedBlankLine,
    #[error("chunk repeats the end-of-stream sentinel")]
    Sentinel,
}

/// Frames one configured preset chunk.
///
/// # Errors
/// Returns the reason a chunk cannot be sent as a single event.
pub fn preset_frame(chunk: &Value) -> Result<SseFrame, MalformedChunk> {
    match chunk {
        Value::Object(_) => Ok(SseFrame::data(&chunk.to_string())),
        Value::String(text) => {
            let text = text.trim_end_matches(['\r', '\n']);
            if text.trim().is_empty() {
                return Err(MalformedChunk::Empty);
            }
            if text.contains("\n\n") || text.contains("\r\n\r\n") {
                return Err(MalformedChunk::EmbeddedBlankLine);
            }
            let payload = text.strip_prefix(DATA_PREFIX).map(str::trim);
            if payload.unwrap_or(text.trim()) == DONE_SENTINEL {
                return Err(MalformedChunk::Sentinel);
            }
            if payload.is_some() {
                Ok(SseFrame::line(text))
            } else {
                Ok(SseFrame::data(text))
            }
        }
        _ => Err(MalformedChunk::UnsupportedType),
    }
}

/// Frames for a preset chunk replay; malformed chunks are logged and skipped.
pub fn preset_frames(chunks: Vec<Value>) -> impl Iterator<Item = SseFrame> + Send {
    chunks
        .into_iter()
        .enumerate()
        .filter_map(|(index, chunk)| match preset_frame(&chunk) {
            Ok(frame) => Some(frame),
            Err(err) => {
                warn!(index, error = %err, "skipping malformed preset chunk");
                None
            }
        })
        .chain(iter::once(SseFrame::done()))
}

/// Pushes frames into `tx`, pausing between them; returns how many were sent.
async fn produce<I>(frames: I, pacing: PacingPolicy, tx: mpsc::Sender<SseFrame>) -> usize
where
    I: Iterator<Item = SseFrame>,
{
    let mut sent = 0;
    for frame in frames {
        if sent > 0 {
            pacing.pause().await;
        }
        if tx.send(frame).await.is_err() {
            debug!(sent, "stream receiver dropped; stopping producer");
            return sent;
        }
        sent += 1;
    }
    sent
}

/// Spawns the producer task and returns the receiving end of its channel.
pub fn spawn_producer<I>(
    frames: I,
    pacing: PacingPolicy,
    capacity: usize,
) -> mpsc::Receiver<SseFrame>
where
    I: Iterator<Item = SseFrame> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        let sent = produce(frames, pacing, tx).await;
        debug!(sent, "stream producer finished");
    });
    rx
}

/// Wraps a frame channel as a `text/event-stream` response.
pub fn sse_response(rx: mpsc::Receiver<SseFrame>) -> Response {
    let body = Body::from_stream(
        ReceiverStream::new(rx).map(|frame| Ok::<String, Infallible>(frame.into_string())),
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Streams `frames` to the client with the given pacing.
pub fn stream_frames<I>(frames: I, pacing: PacingPolicy, capacity: usize) -> Response
where
    I: Iterator<Item = SseFrame> + Send + 'static,
{
    sse_response(spawn_producer(frames, pacing, capacity))
}
