use std::any::Any;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};
use shared::models::{ErrorEnvelope, ErrorKind};
use thiserror::Error;
use tracing::error;

use crate::services::config_store::ConfigStoreError;

pub type AppResult<T> = Result<T, ApiError>;

/// A failure rendered as `{"error": {"message": ..., "type": ...}}`.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequestError, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimeoutError, message)
    }

    pub fn proxy(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProxyError, message)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.kind.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = ErrorEnvelope::new(self.kind, self.message);
        let mut response = (status, Json(envelope)).into_response();
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

impl From<ConfigStoreError> for ApiError {
    fn from(err: ConfigStoreError) -> Self {
        error!(error = %err, "configuration document unavailable");
        Self::internal_server_error(err.to_string())
    }
}

/// Renders a handler panic as the internal error envelope.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unexpected failure while handling the request".to_string()
    };

    error!(panic = %detail, "request handler panicked");
    ApiError::internal_server_error(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::header::CONTENT_TYPE};
    use serde_json::{Value, json};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn constructors_pick_matching_status() {
        assert_eq!(ApiError::invalid_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::internal_server_error("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::proxy("x").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ApiError::timeout("x").status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ApiError::proxy("x").kind, ErrorKind::ProxyError);
    }

    #[tokio::test]
    async fn into_response_renders_error_envelope() {
        let response = ApiError::invalid_request("model parameter is required").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(
            body_json(response).await,
            json!({
                "error": {
                    "message": "model parameter is required",
                    "type": "invalid_request_error"
                }
            })
        );
    }

    #[tokio::test]
    async fn store_errors_become_internal_errors() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: ApiError = ConfigStoreError::Malformed(source).into();
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "internal_server_error");
        assert!(
            body["error"]["message"]
                .as_str()
                .unwrap()
                .starts_with("configuration document is not valid")
        );
    }

    #[tokio::test]
    async fn panic_payloads_are_reported() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"]["message"], "boom");

        let response = handle_panic(Box::new(42_u8));
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "internal_server_error");
    }
}
