//! Proxy mode against a loopback upstream.

mod common;

use std::{convert::Infallible, time::Duration};

use axum::{
    Json, Router,
    body::Body,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use common::{COMPLETIONS, test_server};
use futures::{StreamExt, stream};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const UPSTREAM_STREAM: &str = "data: {\"id\":\"up-1\"}\n\ndata: {\"id\":\"up-2\"}\n\ndata: [DONE]\n\n";

async fn upstream_completions(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if body["stream"] == json!(true) {
        return (
            [(header::CONTENT_TYPE, "text/event-stream")],
            UPSTREAM_STREAM,
        )
            .into_response();
    }

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    Json(json!({
        "object": "chat.completion",
        "model": body["model"],
        "authorization": authorization,
        "echo": body
    }))
    .into_response()
}

async fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"error":{"message":"overloaded"}}"#,
    )
        .into_response()
}

async fn slow() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::OK
}

const STALLING_HEAD: &str = "data: {\"id\":\"up-1\"}\n\n: keep-alive\n\nevent: ping\n\n\ndata: {\"id\":\"up-2\"}\n";

// Sends a few lines, then goes quiet for longer than any test timeout.
async fn stalling() -> Response {
    let head = stream::iter([Ok::<_, Infallible>(STALLING_HEAD)]);
    let late = stream::once(async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, Infallible>("data: {\"id\":\"too-late\"}\n\n")
    });
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(head.chain(late)),
    )
        .into_response()
}

async fn spawn_upstream() -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(upstream_completions))
        .route("/unavailable", post(unavailable))
        .route("/slow", post(slow))
        .route("/stalling", post(stalling));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn proxy_document(target_url: &str, extra: Value) -> Value {
    let mut proxy_config = json!({
        "enabled": true,
        "target_url": target_url,
        "timeout": 2
    });
    if let (Some(fields), Some(extra)) = (proxy_config.as_object_mut(), extra.as_object()) {
        fields.extend(extra.clone());
    }
    json!({"mode": "proxy", "proxy_config": proxy_config})
}

#[tokio::test]
async fn forwards_with_model_override_and_bearer_key() {
    let upstream = spawn_upstream().await;
    let server = test_server(proxy_document(
        &format!("{upstream}/v1/chat/completions"),
        json!({"api_key": "sk-test", "model": "gpt-4o-override"}),
    ));

    let response = server
        .post(COMPLETIONS)
        .json(&json!({"model": "gpt-4", "messages": [{"role": "user", "content": "Hi"}], "seed": 7}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["model"], "gpt-4o-override");
    assert_eq!(body["authorization"], "Bearer sk-test");
    assert_eq!(body["echo"]["seed"], 7);
}

#[tokio::test]
async fn forwards_without_validation_or_credentials() {
    let upstream = spawn_upstream().await;
    let server = test_server(proxy_document(
        &format!("{upstream}/v1/chat/completions"),
        json!({}),
    ));

    let response = server
        .post(COMPLETIONS)
        .json(&json!({"anything": "goes"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body["authorization"].is_null());
    assert_eq!(body["echo"], json!({"anything": "goes"}));
}

#[tokio::test]
async fn upstream_error_status_and_body_are_relayed() {
    let upstream = spawn_upstream().await;
    let server = test_server(proxy_document(&format!("{upstream}/unavailable"), json!({})));

    let response = server
        .post(COMPLETIONS)
        .json(&json!({"model": "gpt-4", "messages": []}))
        .await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text(), r#"{"error":{"message":"overloaded"}}"#);
}

#[tokio::test]
async fn upstream_timeout_is_a_gateway_timeout() {
    let upstream = spawn_upstream().await;
    let server = test_server(proxy_document(
        &format!("{upstream}/slow"),
        json!({"timeout": 0.2}),
    ));

    let response = server
        .post(COMPLETIONS)
        .json(&json!({"model": "gpt-4", "messages": []}))
        .await;

    assert_eq!(response.status_code(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        response.json::<Value>(),
        json!({"error": {"message": "Request to target API timed out", "type": "timeout_error"}})
    );
}

#[tokio::test]
async fn unreachable_upstream_is_a_proxy_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let server = test_server(proxy_document(
        &format!("http://{addr}/v1/chat/completions"),
        json!({}),
    ));

    let response = server
        .post(COMPLETIONS)
        .json(&json!({"model": "gpt-4", "messages": []}))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "proxy_error");
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn streamed_upstream_lines_are_relayed() {
    let upstream = spawn_upstream().await;
    let server = test_server(proxy_document(
        &format!("{upstream}/v1/chat/completions"),
        json!({}),
    ));

    let response = server
        .post(COMPLETIONS)
        .json(&json!({"model": "gpt-4", "messages": [], "stream": true}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.text(), UPSTREAM_STREAM);
}

#[tokio::test]
async fn stalled_upstream_stream_ends_the_relay_cleanly() {
    let upstream = spawn_upstream().await;
    let server = test_server(proxy_document(
        &format!("{upstream}/stalling"),
        json!({"timeout": 0.3}),
    ));

    let response = server
        .post(COMPLETIONS)
        .json(&json!({"model": "gpt-4", "messages": [], "stream": true}))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert_eq!(
        body,
        "data: {\"id\":\"up-1\"}\n\n: keep-alive\n\nevent: ping\n\ndata: {\"id\":\"up-2\"}\n\n"
    );
    assert!(!body.contains("too-late"));
    assert!(!body.contains("error"));
}
