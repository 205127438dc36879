//! ApexKit protocol definitions: URL layout, query encoding and realtime frame
//! demultiplexing.

use serde_json::Value;

use crate::error::FrameError;
use crate::models::{SearchResponse, ServerEvent};

/// Version prefix applied to every non-root REST path.
pub const API_PREFIX: &str = "/api/v1";
/// Realtime WebSocket endpoint, relative to the base URL.
pub const WS_PATH: &str = "/ws";
/// Server-sent events endpoint, relative to the base URL.
pub const SSE_PATH: &str = "/sse";
/// Heartbeat text sent by the server over the socket.
pub const HEARTBEAT: &str = "Pong";
/// Query keys whose composite values are sent JSON-encoded.
pub const STRUCTURED_PARAMS: &[&str] = &["filter"];

/// Strip trailing slashes so paths can be appended with a single separator.
pub fn trim_base_url(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Resolve an endpoint to the request path, applying the version prefix
/// unless `root` is set or the prefix is already present.
pub fn api_path(endpoint: &str, root: bool) -> String {
    if root || endpoint.starts_with(API_PREFIX) {
        if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{endpoint}")
        }
    } else if endpoint.starts_with('/') {
        format!("{API_PREFIX}{endpoint}")
    } else {
        format!("{API_PREFIX}/{endpoint}")
    }
}

/// Base URL of a tenant-scoped context.
pub fn tenant_url(base_url: &str, tenant_id: &str) -> String {
    format!(
        "{}/tenant/{}",
        trim_base_url(base_url),
        urlencoding::encode(tenant_id)
    )
}

/// Base URL of a sandbox-scoped context.
pub fn sandbox_url(base_url: &str, sandbox_id: &str) -> String {
    format!(
        "{}/sandbox/{}",
        trim_base_url(base_url),
        urlencoding::encode(sandbox_id)
    )
}

/// Convert an HTTP(S) base URL into the realtime socket URL.
pub fn ws_url(base_url: &str) -> String {
    let base = trim_base_url(base_url);
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws_base}{WS_PATH}")
}

/// URL of the server-sent events stream, optionally narrowed to a channel and event.
pub fn sse_url(base_url: &str, channel: Option<&str>, event: Option<&str>) -> String {
    let mut params = Vec::new();
    if let Some(channel) = channel {
        params.push(format!("channel={}", urlencoding::encode(channel)));
    }
    if let Some(event) = event {
        params.push(format!("event={}", urlencoding::encode(event)));
    }
    let base = format!("{}{SSE_PATH}", trim_base_url(base_url));
    if params.is_empty() {
        base
    } else {
        format!("{base}?{}", params.join("&"))
    }
}

/// Public URL of a stored file.
///
/// Absolute `http(s)://` URLs (e.g. S3 objects) are returned unchanged; bare
/// names resolve against the given context's base URL.
pub fn file_url(base_url: &str, filename: &str) -> String {
    if filename.starts_with("http://") || filename.starts_with("https://") {
        return filename.to_string();
    }
    let base = trim_base_url(base_url);
    let name = filename.trim_start_matches('/');
    format!("{base}{API_PREFIX}/storage/file/{name}")
}

/// Fresh correlation identifier for a request multiplexed over the socket.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Encode one query parameter value. Returns `None` for values that are skipped.
pub fn encode_query_value(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(items) if !STRUCTURED_PARAMS.contains(&key) => Some(
            items
                .iter()
                .filter_map(|item| encode_query_value(key, item))
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// A decoded inbound realtime frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Server keep-alive, ignored.
    Heartbeat,
    /// Reply to a correlated request; never a broadcast.
    Response(SearchResponse),
    /// Broadcast for general listeners.
    Event(ServerEvent),
}

/// Demultiplex an inbound text frame.
///
/// Frames carrying a `request_id` are responses and nothing else; all other
/// frames are broadcasts decoded by their `type`.
pub fn parse_inbound(text: &str) -> Result<InboundFrame, FrameError> {
    if text.trim() == HEARTBEAT {
        return Ok(InboundFrame::Heartbeat);
    }

    let value: Value = serde_json::from_str(text).map_err(FrameError::Malformed)?;
    if value.as_str() == Some(HEARTBEAT) {
        return Ok(InboundFrame::Heartbeat);
    }

    match value.get("request_id") {
        Some(id) if !id.is_null() => {
            let request_id = match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            serde_json::from_value::<SearchResponse>(value)
                .map(InboundFrame::Response)
                .map_err(|source| FrameError::Response { request_id, source })
        }
        _ => {
            let kind = value
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string);
            serde_json::from_value::<ServerEvent>(value)
                .map(InboundFrame::Event)
                .map_err(|source| FrameError::UnknownEvent { kind, source })
        }
    }
}
