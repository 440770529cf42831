#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::Value;
use server::{
    app_state::AppState,
    server::{create_app_router, metrics_handle},
    services::{config_store::MemoryStore, proxy_forwarder::ProxyForwarder},
};
use shared::config::server::{Config, Profile};

pub const COMPLETIONS: &str = "/v1/chat/completions";

/// A full application router over an in-memory configuration document.
pub fn test_server(document: Value) -> TestServer {
    let config = Config::default_for_profile(Profile::Test);
    let state = Arc::new(AppState::new(
        Arc::new(MemoryStore::new(document)),
        ProxyForwarder::new().expect("http client"),
        &config.streaming,
    ));
    let app = create_app_router(state, &config, metrics_handle());
    TestServer::new(app).expect("test server")
}

/// Splits an SSE body into event payloads, `[DONE]` included.
pub fn sse_payloads(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            frame
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("frame without data prefix: {frame:?}"))
                .to_string()
        })
        .collect()
}

/// Parses every JSON event of an SSE body, asserting it ends with one `[DONE]`.
pub fn sse_chunks(body: &str) -> Vec<Value> {
    assert!(body.ends_with("data: [DONE]\n\n"), "stream must end with [DONE]: {body:?}");
    assert_eq!(body.matches("data: [DONE]").count(), 1);

    let payloads = sse_payloads(body);
    payloads[..payloads.len() - 1]
        .iter()
        .map(|payload| serde_json::from_str(payload).expect("chunk json"))
        .collect()
}

/// Concatenates a string field of every chunk's delta, addressed by JSON pointer.
pub fn concat_deltas(chunks: &[Value], pointer: &str) -> String {
    chunks
        .iter()
        .filter_map(|chunk| chunk["choices"][0]["delta"].pointer(pointer))
        .filter_map(Value::as_str)
        .collect()
}
