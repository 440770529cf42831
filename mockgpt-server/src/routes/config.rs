use crate::{
    app_state::AppState,
    handlers::config::{get_config, save_config},
};
use axum::{Router, routing::get};
use std::sync::Arc;

/// Configures the configuration document routes.
pub fn create_router_config() -> Router<Arc<AppState>> {
    Router::new().route("/api/config", get(get_config).post(save_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::app_state::test_state;

    #[tokio::test]
    async fn saved_document_is_returned_verbatim() {
        let app = create_router_config().with_state(test_state(json!({"mode": "mock"})));
        let server = TestServer::new(app).expect("test server");

        let initial: Value = server.get("/api/config").await.json();
        assert_eq!(initial, json!({"mode": "mock"}));

        let document = json!({
            "mode": "proxy",
            "proxy_config": {"enabled": false},
            "notes": "kept as-is"
        });
        let saved = server.post("/api/config").json(&document).await;
        assert_eq!(saved.status_code(), StatusCode::OK);
        assert_eq!(saved.json::<Value>(), json!({"status": "success"}));

        let reread: Value = server.get("/api/config").await.json();
        assert_eq!(reread, document);
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let app = create_router_config().with_state(test_state(json!({})));
        let server = TestServer::new(app).expect("test server");

        let response = server
            .post("/api/config")
            .content_type("application/json")
            .text("{")
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["error"]["type"],
            "invalid_request_error"
        );
        assert_eq!(server.get("/api/config").await.json::<Value>(), json!({}));
    }
}
