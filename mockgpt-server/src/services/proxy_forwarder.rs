//! Forwards chat completion requests to an upstream endpoint and classifies the
//! result as an [`UpstreamOutcome`].

use std::time::Duration;

use axum::{
    body::Bytes,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
};
use futures::TryStreamExt;
use serde_json::Value;
use shared::config::ProxyConfig;
use tokio::{io::AsyncBufReadExt, sync::mpsc, time::Instant};
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

use super::stream_framer::SseFrame;

const USER_AGENT: &str = concat!("mockgpt/", env!("CARGO_PKG_VERSION"));

/// Result of one upstream call.
#[derive(Debug)]
pub enum UpstreamOutcome {
    /// Non-streamed 200; the body is relayed unchanged.
    Success {
        content_type: Option<HeaderValue>,
        body: Bytes,
    },
    /// Streamed 200; the body has not been read yet.
    Stream(reqwest::Response),
    /// Any status other than 200.
    HttpError {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },
    Timeout(Duration),
    TransportFailure(String),
}

impl UpstreamOutcome {
    /// Label used for failure metrics.
    pub const fn failure_kind(&self) -> Option<&'static str> {
        match self {
            Self::Success { .. } | Self::Stream(_) => None,
            Self::HttpError { .. } => Some("http_status"),
            Self::Timeout(_) => Some("timeout"),
            Self::TransportFailure(_) => Some("transport"),
        }
    }
}

/// Settings for relaying an upstream event stream.
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    /// Bound on each wait for the next upstream line.
    pub read_timeout: Duration,
    pub log_lines: bool,
    pub capacity: usize,
}

impl RelayOptions {
    pub fn from_proxy(proxy: &ProxyConfig, capacity: usize) -> Self {
        Self {
            read_timeout: proxy.timeout_duration(),
            log_lines: proxy.log_responses,
            capacity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyForwarder {
    client: reqwest::Client,
}

impl ProxyForwarder {
    /// Builds a forwarder with its own connection pool.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Sends `request` to the configured target.
    ///
    /// The timeout bounds the wait for the response head and, for non-streamed
    /// replies, the body as well.
    pub async fn forward(&self, mut request: Value, proxy: &ProxyConfig) -> UpstreamOutcome {
        if let Some(model) = proxy.model_override()
            && let Some(fields) = request.as_object_mut()
        {
            fields.insert("model".to_string(), Value::String(model.to_string()));
        }

        let target = proxy.target_url.as_deref().unwrap_or_default();
        let timeout = proxy.timeout_duration();
        let deadline = Instant::now() + timeout;
        let streaming = request.get("stream").and_then(Value::as_bool).unwrap_or(false);

        if proxy.log_requests {
            info!(target_url = %target, streaming, "forwarding request upstream");
            info!(body = %request, "upstream request body");
        }

        let mut builder = self.client.post(target).json(&request);
        if let Some(api_key) = proxy.api_key.as_deref().filter(|key| !key.is_empty()) {
            builder = builder.bearer_auth(api_key);
        }

        let response = match tokio::time::timeout_at(deadline, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return classify_error(&err, timeout),
            Err(_) => return UpstreamOutcome::Timeout(timeout),
        };

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        if status == StatusCode::OK && streaming {
            debug!("relaying upstream event stream");
            return UpstreamOutcome::Stream(response);
        }

        let body = match tokio::time::timeout_at(deadline, response.bytes()).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => return classify_error(&err, timeout),
            Err(_) => return UpstreamOutcome::Timeout(timeout),
        };

        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "upstream returned an error status");
            return UpstreamOutcome::HttpError {
                status,
                content_type,
                body,
            };
        }

        if proxy.log_responses {
            info!(body = %String::from_utf8_lossy(&body), "upstream response body");
        }
        UpstreamOutcome::Success { content_type, body }
    }
}

fn classify_error(err: &reqwest::Error, timeout: Duration) -> UpstreamOutcome {
    if err.is_timeout() {
        UpstreamOutcome::Timeout(timeout)
    } else {
        UpstreamOutcome::TransportFailure(err.to_string())
    }
}

/// Relays an upstream event stream line by line.
///
/// Each non-empty line is re-terminated with a blank line. The relay ends when
/// the upstream finishes, fails, stalls past the read timeout, or the client
/// goes away.
pub fn relay_stream(
    response: reqwest::Response,
    options: RelayOptions,
) -> mpsc::Receiver<SseFrame> {
    let (tx, rx) = mpsc::channel(options.capacity.max(1));

    tokio::spawn(async move {
        let body = response.bytes_stream().map_err(std::io::Error::other);
        let mut lines = StreamReader::new(Box::pin(body)).lines();

        loop {
            let next = tokio::time::timeout(options.read_timeout, lines.next_line()).await;
            let line = match next {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => break,
                Ok(Err(err)) => {
                    warn!(error = %err, "upstream stream failed; closing relay");
                    break;
                }
                Err(_) => {
                    warn!(
                        timeout = ?options.read_timeout,
                        "upstream stream stalled; closing relay"
                    );
                    break;
                }
            };
            if line.is_empty() {
                continue;
            }
            if options.log_lines && line.starts_with("data: ") {
                info!(chunk = %line, "relaying upstream chunk");
            }
            if tx.send(SseFrame::line(&line)).await.is_err() {
                debug!("client disconnected; closing relay");
                break;
            }
        }
    });

    rx
}
