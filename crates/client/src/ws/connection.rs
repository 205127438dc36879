//! Realtime WebSocket connection with subscription replay, correlated
//! searches and auto-reconnect, using tokio-tungstenite.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use apexkit_shared::{
    new_request_id, parse_inbound, ws_url, ClientFrame, FrameError, InboundFrame, SearchPayload,
    ServerEvent, SignalPayload, SubscriptionFilter,
};
use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::pending::PendingRequests;
use crate::config::ClientConfig;
use crate::error::RealtimeError;
use crate::listeners::{ListenerHandle, ListenerRegistry};

/// How long a manual disconnect waits for the close frame to be written.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Connection state of a realtime socket
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Upper bound of the random delay added to each wait
    pub jitter_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
            jitter_ms: 250,
        }
    }
}

impl ReconnectConfig {
    /// Retry forever at a constant interval, without jitter.
    pub fn fixed(delay_ms: u64) -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
            jitter_ms: 0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Calculate delay for a given attempt number, before jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        if !delay.is_finite() {
            return self.max_delay_ms;
        }
        (delay as u64).min(self.max_delay_ms)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        Duration::from_millis(base.saturating_add(jitter))
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

/// State reachable from the public API and the connection task.
#[derive(Default)]
struct Link {
    /// Present iff the socket is open.
    outbound: Option<UnboundedSender<ClientFrame>>,
    /// Desired subscription, replayed on every open.
    filter: Option<SubscriptionFilter>,
    task: Option<ConnectionTask>,
    /// Bumped by every `connect()`. A loop only touches the link while its
    /// own generation is current.
    generation: u64,
}

struct ConnectionTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    url: String,
    token: Option<String>,
    reconnect: ReconnectConfig,
    search_timeout: Duration,
    state: watch::Sender<ConnectionState>,
    link: Mutex<Link>,
    pending: PendingRequests,
    listeners: ListenerRegistry,
}

impl Inner {
    fn lock_link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Publish `state` on behalf of the loop started as `generation`.
    fn set_loop_state(&self, generation: u64, state: ConnectionState) {
        let link = self.lock_link();
        if link.generation == generation {
            self.set_state(state);
        }
    }

    /// Socket opened: publish the sender and replay the subscription before
    /// anything else can be queued. Returns `false` if a newer `connect()`
    /// has taken over the link.
    fn open_link(&self, generation: u64, outbound: UnboundedSender<ClientFrame>) -> bool {
        let mut link = self.lock_link();
        if link.generation != generation {
            tracing::debug!("Dropping superseded realtime session {}", generation);
            return false;
        }
        if let Some(filter) = link.filter.clone() {
            tracing::debug!("Replaying subscription after connect: {:?}", filter);
            let _ = outbound.unbounded_send(ClientFrame::Subscribe(filter));
        }
        link.outbound = Some(outbound);
        self.set_state(ConnectionState::Connected);
        true
    }

    /// Socket closed: stop accepting frames and fail every waiting search.
    /// A superseded loop leaves the link alone.
    fn close_link(&self, generation: u64, state: ConnectionState) {
        let mut link = self.lock_link();
        if link.generation != generation {
            return;
        }
        self.clear_link(&mut link, state);
    }

    fn clear_link(&self, link: &mut Link, state: ConnectionState) {
        link.outbound = None;
        let rejected = self.pending.reject_all(RealtimeError::SocketClosed);
        if rejected > 0 {
            tracing::info!("Rejected {} pending search request(s) on close", rejected);
        }
        self.set_state(state);
    }

    /// Cleanup after a manual disconnect, unless `connect()` already started
    /// a new loop while the old one was winding down.
    fn finish_disconnect(&self) {
        let mut link = self.lock_link();
        if link.task.is_some() {
            tracing::debug!("Realtime reconnected during disconnect; keeping new session");
            return;
        }
        self.clear_link(&mut link, ConnectionState::Disconnected);
    }

    /// Queue a frame if the socket is open.
    fn send(&self, frame: ClientFrame) -> bool {
        match self.lock_link().outbound.as_ref() {
            Some(tx) => tx.unbounded_send(frame).is_ok(),
            None => false,
        }
    }

    fn handle_text(&self, text: &str) {
        match parse_inbound(text) {
            Ok(InboundFrame::Heartbeat) => tracing::trace!("Realtime heartbeat"),
            Ok(InboundFrame::Response(response)) => {
                let request_id = response.request_id.clone();
                if !self.pending.complete(response) {
                    tracing::debug!("No pending request for response {}", request_id);
                }
            }
            Ok(InboundFrame::Event(event)) => {
                self.listeners.dispatch(&event);
            }
            Err(FrameError::Response { request_id, source }) => {
                tracing::error!("Malformed response for request {}: {}", request_id, source);
                self.pending
                    .fail(&request_id, RealtimeError::Decode(source.to_string()));
            }
            Err(e @ FrameError::UnknownEvent { .. }) => {
                tracing::warn!("Dropping realtime frame: {}", e);
            }
            Err(e) => tracing::error!("WS Parse Error: {}", e),
        }
    }
}

/// Realtime client owning a single duplex connection.
///
/// Cheap to clone; clones control the same connection. Must be used from
/// within a tokio runtime.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl RealtimeClient {
    /// Create a client for the socket at `{base_url as ws(s)}/ws`.
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self::build(base_url, token, ReconnectConfig::default(), ClientConfig::default().search_timeout)
    }

    /// Create a client using the reconnect policy and timeouts from `config`.
    pub fn with_config(base_url: &str, token: Option<String>, config: &ClientConfig) -> Self {
        Self::build(base_url, token, config.reconnect.clone(), config.search_timeout)
    }

    fn build(base_url: &str, token: Option<String>, reconnect: ReconnectConfig, search_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                url: ws_url(base_url),
                token,
                reconnect,
                search_timeout,
                state,
                link: Mutex::new(Link::default()),
                pending: PendingRequests::default(),
                listeners: ListenerRegistry::default(),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock_link().outbound.is_some()
    }

    /// Wait until the socket is open. Returns `false` if the client gives up
    /// (`Failed`) or is dropped first.
    pub async fn connected(&self) -> bool {
        let mut rx = self.watch_state();
        let result = rx
            .wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Failed { .. }))
            .await
            .map(|s| s.is_connected());
        result.unwrap_or(false)
    }

    /// The current desired subscription.
    pub fn subscription(&self) -> Option<SubscriptionFilter> {
        self.inner.lock_link().filter.clone()
    }

    /// Number of searches still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Start the connection loop. Does nothing if it is already running.
    pub fn connect(&self) {
        let mut link = self.inner.lock_link();
        if let Some(task) = &link.task {
            if !task.handle.is_finished() {
                tracing::debug!("Realtime connection to {} already running", self.inner.url);
                return;
            }
        }

        link.generation = link.generation.wrapping_add(1);
        // Anything an earlier loop left published is stale from here on.
        self.inner.clear_link(&mut link, ConnectionState::Connecting);
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_connection_loop(
            Arc::downgrade(&self.inner),
            link.generation,
            self.inner.url.clone(),
            self.inner.token.clone(),
            self.inner.reconnect.clone(),
            stop_rx,
        ));
        link.task = Some(ConnectionTask { stop, handle });
    }

    /// Close the socket and stop reconnecting. Waiting searches are rejected.
    pub async fn disconnect(&self) {
        let task = self.inner.lock_link().task.take();
        if let Some(task) = task {
            let _ = task.stop.send(true);
            if let Err(e) = task.handle.await {
                tracing::error!("Realtime connection task failed: {}", e);
            }
            tracing::info!("Realtime disconnected manually from {}", self.inner.url);
        }
        self.inner.finish_disconnect();
    }

    /// Replace the desired subscription and send it if connected.
    pub fn subscribe(&self, filter: SubscriptionFilter) {
        let mut link = self.inner.lock_link();
        link.filter = Some(filter.clone());
        if let Some(tx) = link.outbound.as_ref() {
            let _ = tx.unbounded_send(ClientFrame::Subscribe(filter));
        }
    }

    /// Clear the desired subscription; later reconnects will not resubscribe.
    pub fn unsubscribe(&self) {
        let mut link = self.inner.lock_link();
        link.filter = None;
        if let Some(tx) = link.outbound.as_ref() {
            let _ = tx.unbounded_send(ClientFrame::Unsubscribe);
        }
    }

    /// Broadcast an application signal. Only sent while the socket is open;
    /// returns whether the frame was queued.
    pub fn send_signal(&self, channel: &str, event: &str, data: Value) -> bool {
        let sent = self.inner.send(ClientFrame::Signal(SignalPayload {
            channel: channel.to_string(),
            event: event.to_string(),
            data,
        }));
        if !sent {
            tracing::warn!("Socket not open, cannot send signal {}/{}", channel, event);
        }
        sent
    }

    /// Run a search over the socket and wait for its correlated response.
    pub async fn search(&self, collection_id: i64, query: &str, limit: u32) -> Result<Vec<Value>, RealtimeError> {
        let request_id = new_request_id();

        let mut rx = {
            // Registration happens under the link lock so a concurrent close
            // either precedes it (not connected) or sweeps it.
            let link = self.inner.lock_link();
            let Some(tx) = link.outbound.as_ref() else {
                return Err(RealtimeError::NotConnected);
            };
            let rx = self.inner.pending.register(request_id.clone());
            let frame = ClientFrame::Search(SearchPayload {
                collection_id,
                query: query.to_string(),
                limit,
                request_id: request_id.clone(),
            });
            if tx.unbounded_send(frame).is_err() {
                self.inner.pending.cancel(&request_id);
                return Err(RealtimeError::NotConnected);
            }
            rx
        };

        match tokio::time::timeout(self.inner.search_timeout, &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RealtimeError::SocketClosed),
            Err(_) => {
                if self.inner.pending.cancel(&request_id) {
                    tracing::warn!("Search request {} timed out", request_id);
                    Err(RealtimeError::Timeout)
                } else {
                    // Resolved between the deadline and the cancel.
                    rx.await.unwrap_or(Err(RealtimeError::SocketClosed))
                }
            }
        }
    }

    /// Search and decode each result row into `T`.
    pub async fn search_as<T: DeserializeOwned>(
        &self,
        collection_id: i64,
        query: &str,
        limit: u32,
    ) -> Result<Vec<T>, RealtimeError> {
        self.search(collection_id, query, limit)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| RealtimeError::Decode(e.to_string())))
            .collect()
    }

    /// Register a listener for broadcast events.
    pub fn on_event(&self, callback: impl Fn(&ServerEvent) + Send + Sync + 'static) -> ListenerHandle {
        self.inner.listeners.add(Arc::new(callback))
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

fn build_request(url: &str, token: Option<&str>) -> Result<Request, RealtimeError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| RealtimeError::Transport(e.to_string()))?;
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| RealtimeError::Transport(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}

enum SessionEnd {
    Closed,
    Stopped,
}

/// Connection management loop, one per `connect()`.
///
/// Holds only a weak reference so dropping every client handle ends it.
async fn run_connection_loop(
    inner: Weak<Inner>,
    generation: u64,
    url: String,
    token: Option<String>,
    reconnect: ReconnectConfig,
    mut stop: watch::Receiver<bool>,
) {
    let mut attempt = 0u32;
    let mut final_state = ConnectionState::Disconnected;

    loop {
        if *stop.borrow() {
            break;
        }
        let Some(strong) = inner.upgrade() else { break };
        strong.set_loop_state(
            generation,
            if attempt == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting { attempt }
            },
        );
        drop(strong);

        let request = match build_request(&url, token.as_deref()) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("Invalid realtime request for {}: {}", url, e);
                final_state = ConnectionState::Failed { reason: e.to_string() };
                break;
            }
        };

        let connected = tokio::select! {
            result = connect_async(request) => result,
            _ = stop.changed() => break,
        };

        match connected {
            Ok((stream, _response)) => {
                attempt = 0;
                tracing::info!("Realtime connected to {}", url);
                if let SessionEnd::Stopped = run_session(&inner, generation, stream, &mut stop).await {
                    break;
                }
                tracing::info!("Realtime disconnected from {}. Retrying...", url);
            }
            Err(e) => {
                tracing::error!("Realtime connection to {} failed: {}", url, e);
            }
        }

        if reconnect.exhausted(attempt) {
            final_state = ConnectionState::Failed {
                reason: format!("Max reconnect attempts ({}) exceeded", reconnect.max_attempts),
            };
            break;
        }

        let delay = reconnect.jittered_delay(attempt);
        attempt += 1;
        tracing::info!(
            "Reconnecting to {} in {}ms (attempt {})",
            url,
            delay.as_millis(),
            attempt
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.changed() => break,
        }
    }

    if let Some(strong) = inner.upgrade() {
        strong.close_link(generation, final_state);
    }
}

/// Drive one open socket until it closes or a stop is requested.
async fn run_session<S>(
    inner: &Weak<Inner>,
    generation: u64,
    stream: tokio_tungstenite::WebSocketStream<S>,
    stop: &mut watch::Receiver<bool>,
) -> SessionEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, mut read) = stream.split();
    let (outbound, mut outbound_rx) = unbounded::<ClientFrame>();
    let (close_tx, mut close_rx) = tokio::sync::mpsc::unbounded_channel::<()>();

    let opened = inner
        .upgrade()
        .is_some_and(|strong| strong.open_link(generation, outbound));
    if !opened {
        let _ = write.close().await;
        return SessionEnd::Stopped;
    }

    // Read task
    let inner_for_read = inner.clone();
    let close_tx_for_read = close_tx.clone();
    let read_task = tokio::spawn(async move {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    tracing::debug!("Realtime received: {}", text.as_str());
                    let Some(strong) = inner_for_read.upgrade() else { break };
                    strong.handle_text(text.as_str());
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!("Realtime socket received close frame: {:?}", frame);
                    break;
                }
                Ok(Message::Ping(data)) => {
                    // Pong is handled automatically by tungstenite
                    tracing::trace!("Received ping: {:?}", data);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Realtime read error: {}", e);
                    break;
                }
            }
        }
        let _ = close_tx_for_read.send(());
    });

    // Write task; ends when the link drops its sender.
    let write_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.next().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    tracing::debug!("Realtime sending: {}", json);
                    if let Err(e) = write.send(Message::text(json)).await {
                        tracing::error!("Realtime send failed: {}", e);
                        break;
                    }
                }
                Err(e) => tracing::error!("Serialize failed: {}", e),
            }
        }
        let _ = write.close().await;
        let _ = close_tx.send(());
    });

    let stopped = tokio::select! {
        _ = close_rx.recv() => false,
        _ = stop.changed() => true,
    };

    if let Some(strong) = inner.upgrade() {
        strong.close_link(generation, ConnectionState::Disconnected);
    }

    if stopped {
        if tokio::time::timeout(CLOSE_GRACE, write_task).await.is_err() {
            tracing::debug!("Close frame not flushed within {:?}", CLOSE_GRACE);
        }
        read_task.abort();
        SessionEnd::Stopped
    } else {
        read_task.abort();
        write_task.abort();
        SessionEnd::Closed
    }
}
