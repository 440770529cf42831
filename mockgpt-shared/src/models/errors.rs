use serde::{Deserialize, Serialize};

/// Error categories exposed on the wire as `error.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequestError,
    InternalServerError,
    TimeoutError,
    ProxyError,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequestError => "invalid_request_error",
            Self::InternalServerError => "internal_server_error",
            Self::TimeoutError => "timeout_error",
            Self::ProxyError => "proxy_error",
        }
    }

    /// HTTP status code paired with this kind.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::InvalidRequestError => 400,
            Self::InternalServerError => 500,
            Self::ProxyError => 502,
            Self::TimeoutError => 504,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `error` member of an [`ErrorEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable description of the failure
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
}

/// Represents an error response: `{"error": {"message": ..., "type": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    /// Creates a new envelope of the given kind.
    ///
    /// # Arguments
    /// * `kind` - The error category
    /// * `message` - The error message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                kind,
            },
        }
    }
}
