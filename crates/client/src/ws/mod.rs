//! WebSocket module for realtime record changes, signals and searches.
//!
//! This module provides:
//! - Connection management with auto-reconnect
//! - Subscription replay after every (re)connect
//! - Request/response correlation for searches over the socket
//!
//! # Architecture
//!
//! ```text
//!   ┌─────────────────────────────────────────┐
//!   │              RealtimeClient             │
//!   │  (desired filter, pending map, state)   │
//!   └─────────────────────────────────────────┘
//!          │ spawn                  ▲ open / close
//!          ▼                        │
//!   ┌─────────────────────────────────────────┐
//!   │           connection loop task          │
//!   │   read task ──► dispatch / correlate    │
//!   │   write task ◄── outbound frames        │
//!   └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let realtime = client.realtime();
//! realtime.subscribe(SubscriptionFilter::for_collection(3));
//! realtime.on_event(|event| println!("{event:?}"));
//! realtime.connect();
//!
//! let hits = realtime.search(3, "running shoes", 10).await?;
//! ```

mod connection;
mod pending;

pub use connection::{ConnectionState, ReconnectConfig, RealtimeClient};
