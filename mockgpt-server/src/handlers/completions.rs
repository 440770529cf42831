//! `POST /v1/chat/completions`: picks mock or proxy mode per request.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use shared::{
    config::{ConfigDocument, Mode, ProxyConfig},
    models::ChatRequest,
};
use tracing::{debug, info, instrument};

use crate::{
    app_state::AppState,
    http::error::{ApiError, AppResult},
    services::{
        preset_matcher::find_preset,
        proxy_forwarder::{RelayOptions, UpstreamOutcome, relay_stream},
        stream_framer::{completion_frames, preset_frames, sse_response, stream_frames},
        synthesizer::{MockReply, mock_reply},
    },
};

#[instrument(skip_all)]
pub async fn post_chat_completions(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<Response> {
    let payload: Value = serde_json::from_slice(&body).map_err(|err| {
        ApiError::invalid_request(format!("request body is not valid JSON: {err}"))
    })?;
    let snapshot = state.config_store.snapshot().await?;

    let mode = if snapshot.proxy_active() {
        Mode::Proxy
    } else {
        Mode::Mock
    };
    info!(mode = %mode, configured = %snapshot.mode(), "routing chat completion");
    metrics::counter!("chat_completions_total", "mode" => mode.as_str()).increment(1);

    match mode {
        Mode::Proxy => Ok(forward(&state, payload, snapshot.proxy()).await),
        Mode::Mock => respond_with_mock(&state, payload, &snapshot),
    }
}

fn respond_with_mock(
    state: &AppState,
    payload: Value,
    snapshot: &ConfigDocument,
) -> AppResult<Response> {
    let request: ChatRequest = serde_json::from_value(payload)
        .map_err(|err| ApiError::invalid_request(format!("invalid request body: {err}")))?;
    validate(&request)?;

    let preset = find_preset(&request, snapshot.presets());
    if let Some(preset) = preset {
        info!(preset = preset.label(), "matched preset response");
    }

    let response = match mock_reply(&request, preset, snapshot.mock_defaults()) {
        MockReply::Literal(value) => Json(value).into_response(),
        MockReply::Chunks(chunks) => {
            stream_frames(preset_frames(chunks), state.pacing, state.channel_capacity)
        }
        MockReply::Completion(completion) if request.is_stream() => {
            debug!(id = %completion.id, "streaming synthesized completion");
            stream_frames(
                completion_frames(completion),
                state.pacing,
                state.channel_capacity,
            )
        }
        MockReply::Completion(completion) => Json(completion).into_response(),
    };
    Ok(response)
}

fn validate(request: &ChatRequest) -> AppResult<()> {
    if request.model_name().is_none() {
        return Err(ApiError::invalid_request("model parameter is required"));
    }
    if request.message_list().is_none() {
        return Err(ApiError::invalid_request("messages parameter is required"));
    }
    Ok(())
}

async fn forward(state: &AppState, payload: Value, proxy: &ProxyConfig) -> Response {
    let outcome = state.forwarder.forward(payload, proxy).await;
    if let Some(kind) = outcome.failure_kind() {
        metrics::counter!("proxy_upstream_failures_total", "kind" => kind).increment(1);
    }

    match outcome {
        UpstreamOutcome::Success { content_type, body } => {
            relay_body(StatusCode::OK, content_type, body)
        }
        UpstreamOutcome::HttpError {
            status,
            content_type,
            body,
        } => relay_body(status, content_type, body),
        UpstreamOutcome::Stream(response) => sse_response(relay_stream(
            response,
            RelayOptions::from_proxy(proxy, state.channel_capacity),
        )),
        UpstreamOutcome::Timeout(after) => {
            info!(timeout = ?after, "upstream request timed out");
            ApiError::timeout("Request to target API timed out").into_response()
        }
        UpstreamOutcome::TransportFailure(detail) => {
            info!(error = %detail, "upstream request failed");
            ApiError::proxy(format!("Failed to forward request: {detail}")).into_response()
        }
    }
}

fn relay_body(status: StatusCode, content_type: Option<HeaderValue>, body: Bytes) -> Response {
    let mut response = (status, body).into_response();
    response.headers_mut().insert(
        CONTENT_TYPE,
        content_type.unwrap_or_else(|| HeaderValue::from_static("application/json")),
    );
    response
}
