//! Client error types.

use serde_json::Value;

/// Failure of a REST call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// DNS, connection or timeout failure; the transport error is kept as the source.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx response. Displays as the server-supplied message.
    #[error("{message}")]
    Http {
        status: u16,
        code: Option<String>,
        message: String,
        details: Option<Value>,
    },
    /// A root-level query answered with an `errors` field.
    #[error("{message}")]
    GraphQl { message: String, details: Value },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Server-supplied error code (`error` field of the body).
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            ApiError::Http { details, .. } => details.as_ref(),
            ApiError::GraphQl { details, .. } => Some(details),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Failure of a realtime operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    #[error("Socket not connected")]
    NotConnected,
    #[error("Search request timed out")]
    Timeout,
    #[error("Socket closed")]
    SocketClosed,
    /// Error reported by the server for a correlated request.
    #[error("{0}")]
    Server(String),
    #[error("failed to decode results: {0}")]
    Decode(String),
    #[error("transport error: {0}")]
    Transport(String),
}
