//! Shared error types: the server's error envelope and frame decoding errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the backend for non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Machine-readable error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    /// Lenient decode: anything that isn't a well-formed envelope yields an empty body.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// Attempt to pull a user-facing message out of an error body.
pub fn try_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    parsed.message.filter(|m| !m.trim().is_empty())
}

/// Failure to decode an inbound realtime frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("malformed response for request {request_id}: {source}")]
    Response {
        request_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unrecognized event type {kind:?}: {source}")]
    UnknownEvent {
        kind: Option<String>,
        #[source]
        source: serde_json::Error,
    },
}
