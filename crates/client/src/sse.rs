//! One-way realtime stream over Server-Sent Events.
//!
//! The stream reconnects on its own, the way a browser `EventSource` does:
//! it waits the server-provided `retry:` interval and resends the last seen
//! event id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use apexkit_shared::{parse_inbound, sse_url, trim_base_url, InboundFrame, ServerEvent};
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use tokio::task::JoinHandle;

use crate::config::DEFAULT_SSE_RETRY_MS;
use crate::listeners::{ListenerHandle, ListenerRegistry};

const LAST_EVENT_ID: &str = "Last-Event-ID";

#[derive(Default)]
struct SseShared {
    listeners: ListenerRegistry,
    task: Mutex<Option<JoinHandle<()>>>,
    connected: AtomicBool,
}

impl SseShared {
    fn handle_data(&self, data: &str) {
        match parse_inbound(data) {
            Ok(InboundFrame::Event(event)) => {
                self.listeners.dispatch(&event);
            }
            Ok(InboundFrame::Heartbeat) => tracing::trace!("SSE heartbeat"),
            Ok(InboundFrame::Response(response)) => {
                tracing::debug!("Ignoring SSE response frame {}", response.request_id);
            }
            Err(e) => tracing::error!("SSE Parse Error: {}", e),
        }
    }

    fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Read-only realtime client. Clones share the same stream and listeners.
#[derive(Clone)]
pub struct SseClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    retry: Duration,
    shared: Arc<SseShared>,
}

impl SseClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: trim_base_url(base_url).to_string(),
            token,
            retry: Duration::from_millis(DEFAULT_SSE_RETRY_MS),
            shared: Arc::new(SseShared::default()),
        }
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Delay between reconnects until the server sends its own `retry:`.
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// Whether a stream is currently open.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Open `{base}/sse?channel=..&event=..`, closing any previous stream first.
    pub fn connect(&self, channel: Option<&str>, event: Option<&str>) {
        self.disconnect();

        let url = sse_url(&self.base_url, channel, event);
        tracing::info!("SSE Connecting to {}...", url);
        let handle = tokio::spawn(run_stream(
            Arc::downgrade(&self.shared),
            self.http.clone(),
            url,
            self.token.clone(),
            self.retry,
        ));
        *self.shared.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Close the stream. Listeners stay registered.
    pub fn disconnect(&self) {
        if let Some(task) = self.shared.take_task() {
            task.abort();
            tracing::info!("SSE disconnected");
        }
        self.shared.connected.store(false, Ordering::SeqCst);
    }

    /// Register a listener for pushed events.
    pub fn on_event(&self, callback: impl Fn(&ServerEvent) + Send + Sync + 'static) -> ListenerHandle {
        self.shared.listeners.add(Arc::new(callback))
    }
}

async fn run_stream(shared: Weak<SseShared>, http: Client, url: String, token: Option<String>, mut retry: Duration) {
    let mut last_event_id: Option<String> = None;

    loop {
        let mut request = http.get(&url).header(ACCEPT, "text/event-stream");
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        if let Some(id) = &last_event_id {
            request = request.header(LAST_EVENT_ID, id.as_str());
        }

        match request.send().await {
            Ok(response) if response.status() == StatusCode::NO_CONTENT => {
                tracing::info!("SSE server ended the stream at {}", url);
                break;
            }
            Ok(response) if !response.status().is_success() => {
                tracing::error!("SSE Connection Error/Reconnecting... status {}", response.status());
            }
            Ok(response) => {
                let Some(strong) = shared.upgrade() else { return };
                strong.connected.store(true, Ordering::SeqCst);
                drop(strong);
                tracing::info!("SSE Connected");

                let mut events = response.bytes_stream().eventsource();
                while let Some(item) = events.next().await {
                    match item {
                        Ok(event) => {
                            if let Some(server_retry) = event.retry {
                                retry = server_retry;
                            }
                            if !event.id.is_empty() {
                                last_event_id = Some(event.id.clone());
                            }
                            if event.data.is_empty() {
                                continue;
                            }
                            let Some(strong) = shared.upgrade() else { return };
                            strong.handle_data(&event.data);
                        }
                        Err(e) => {
                            tracing::error!("SSE Connection Error/Reconnecting... {}", e);
                            break;
                        }
                    }
                }

                match shared.upgrade() {
                    Some(strong) => strong.connected.store(false, Ordering::SeqCst),
                    None => return,
                }
            }
            Err(e) => {
                tracing::error!("SSE Connection Error/Reconnecting... {}", e);
            }
        }

        if shared.strong_count() == 0 {
            return;
        }
        tokio::time::sleep(retry).await;
    }

    if let Some(strong) = shared.upgrade() {
        strong.connected.store(false, Ordering::SeqCst);
    }
}
