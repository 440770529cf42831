//! Routes for the OpenAI-compatible completion endpoint.

use crate::{app_state::AppState, handlers::completions::post_chat_completions};
use axum::{Router, routing::post};
use std::sync::Arc;

/// Configures the chat completion route.
///
/// # Returns
/// A [`Router`](axum::Router) serving `POST /v1/chat/completions`.
pub fn create_router_completions() -> Router<Arc<AppState>> {
    Router::new().route("/v1/chat/completions", post(post_chat_completions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::app_state::test_state;

    fn server(document: Value) -> TestServer {
        let _ = crate::server::metrics_handle();
        let app = create_router_completions().with_state(test_state(document));
        TestServer::new(app).expect("test server")
    }

    #[tokio::test]
    async fn returns_synthesized_completion() {
        let server = server(json!({"mock_config": {"default_content": "Hi"}}));

        let response = server
            .post("/v1/chat/completions")
            .json(&json!({
                "model": "gpt-4",
                "messages": [{"role": "user", "content": "Hello"}]
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["object"], "chat.completion");
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["choices"][0]["message"]["content"], "Hi");
        assert_eq!(body["choices"][0]["finish_reason"], "stop");
        assert_eq!(body["usage"]["total_tokens"], 120);
    }

    #[tokio::test]
    async fn rejects_non_json_bodies() {
        let server = server(json!({}));

        let response = server
            .post("/v1/chat/completions")
            .content_type("application/json")
            .text("{not json")
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn unreadable_configuration_is_an_internal_error() {
        let server = server(json!({"preset_responses": 7}));

        let response = server
            .post("/v1/chat/completions")
            .json(&json!({"model": "gpt-4", "messages": [{"role": "user", "content": "x"}]}))
            .await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"]["type"], "internal_server_error");
    }
}
