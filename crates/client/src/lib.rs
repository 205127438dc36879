//! ApexKit client
//!
//! Async Rust client for an ApexKit backend: authenticated HTTP calls with
//! typed resource accessors, tenant/sandbox context switching, and realtime
//! updates over WebSocket or Server-Sent Events.

pub mod api_client;
pub mod config;
pub mod error;
pub mod listeners;
pub mod logging;
pub mod request;
pub mod resources;
pub mod sse;
pub mod ws;

pub use api_client::ApiClient;
pub use config::ClientConfig;
pub use error::{ApiError, RealtimeError};
pub use listeners::{Listener, ListenerHandle};
pub use request::{ApiResponse, RequestBody, RequestOptions};
pub use sse::SseClient;
pub use ws::{ConnectionState, RealtimeClient, ReconnectConfig};

pub use apexkit_shared as shared;
