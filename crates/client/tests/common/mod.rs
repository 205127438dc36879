//! In-process mock backend for integration tests.
//!
//! HTTP routes cover the response shapes the client normalizes; everything
//! else is echoed back. `/ws` records inbound frames and pushes whatever the
//! test broadcasts; `/sse` streams broadcast data.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{stream, SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};

pub const TOKEN: &str = "jwt-123";

#[derive(Debug, Clone)]
enum WsPush {
    Text(String),
    Close,
}

#[derive(Debug, Clone)]
enum SsePush {
    Data { id: Option<String>, data: String },
    Close,
}

#[derive(Debug, Clone)]
pub struct SseRequest {
    pub query: HashMap<String, String>,
    pub last_event_id: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Clone)]
struct MockState {
    ws_push: broadcast::Sender<WsPush>,
    ws_frames: mpsc::UnboundedSender<Value>,
    ws_connections: Arc<AtomicUsize>,
    ws_auth: Arc<Mutex<Vec<Option<String>>>>,
    sse_push: broadcast::Sender<SsePush>,
    sse_requests: Arc<Mutex<Vec<SseRequest>>>,
}

pub struct MockBackend {
    pub base_url: String,
    state: MockState,
    frames: tokio::sync::Mutex<mpsc::UnboundedReceiver<Value>>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let (ws_push, _) = broadcast::channel(64);
        let (sse_push, _) = broadcast::channel(64);
        let (ws_frames, frames) = mpsc::unbounded_channel();
        let state = MockState {
            ws_push,
            ws_frames,
            ws_connections: Arc::new(AtomicUsize::new(0)),
            ws_auth: Arc::new(Mutex::new(Vec::new())),
            sse_push,
            sse_requests: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/api/v1/missing", get(missing))
            .route("/api/v1/empty", get(|| async { StatusCode::NO_CONTENT }))
            .route("/api/v1/text", get(|| async { "hello" }))
            .route("/api/v1/html", get(|| async { Html("<p>hi</p>") }))
            .route("/api/v1/text-error", get(text_error))
            .route("/api/v1/text-json-error", get(text_json_error))
            .route("/api/v1/blank-error", get(|| async { StatusCode::BAD_GATEWAY }))
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/auth/me", get(me))
            .route("/api/v1/storage/upload", post(upload))
            .route("/api/v1/admin/export-data/{id}", get(export))
            .route("/graphql", post(graphql))
            .route("/ws", get(ws_handler))
            .route("/sse", get(sse_handler))
            .fallback(echo)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock backend");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            frames: tokio::sync::Mutex::new(frames),
        }
    }

    /// Send a text frame to every open socket.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.state.ws_push.send(WsPush::Text(frame.into()));
    }

    pub fn push_json(&self, frame: Value) {
        self.push(frame.to_string());
    }

    /// Close every open socket from the server side.
    pub fn drop_connections(&self) {
        let _ = self.state.ws_push.send(WsPush::Close);
    }

    pub fn ws_connections(&self) -> usize {
        self.state.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ws_auth_headers(&self) -> Vec<Option<String>> {
        self.state.ws_auth.lock().unwrap().clone()
    }

    /// Next frame the server received over any socket.
    pub async fn next_frame(&self) -> Value {
        let mut frames = self.frames.lock().await;
        tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("frame channel closed")
    }

    /// Skip frames until one of the given `type` arrives.
    pub async fn next_frame_of(&self, kind: &str) -> Value {
        loop {
            let frame = self.next_frame().await;
            if frame["type"] == kind {
                return frame;
            }
        }
    }

    /// Whether no frame arrives within `wait`.
    pub async fn no_frame_within(&self, wait: Duration) -> bool {
        let mut frames = self.frames.lock().await;
        tokio::time::timeout(wait, frames.recv()).await.is_err()
    }

    pub fn push_sse(&self, id: Option<&str>, data: impl Into<String>) {
        let _ = self.state.sse_push.send(SsePush::Data {
            id: id.map(str::to_string),
            data: data.into(),
        });
    }

    pub fn close_sse(&self) {
        let _ = self.state.sse_push.send(SsePush::Close);
    }

    pub fn sse_requests(&self) -> Vec<SseRequest> {
        self.state.sse_requests.lock().unwrap().clone()
    }
}

/// Poll `condition` until it holds, panicking after five seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Receive with a five second limit.
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "authorization": bearer(&headers),
        "content_type": headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        "body": body,
    }))
}

async fn missing() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "not found", "error": "NOT_FOUND", "details": { "id": 99 } })),
    )
        .into_response()
}

async fn text_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn text_json_error() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        r#"{"message":"Rate limit exceeded"}"#,
    )
        .into_response()
}

async fn login(Json(credentials): Json<Value>) -> Response {
    if credentials["password"] != "secret" {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid credentials" }))).into_response();
    }
    Json(json!({
        "token": TOKEN,
        "user": { "id": 1, "email": credentials["email"], "role": "admin" }
    }))
    .into_response()
}

async fn me(headers: HeaderMap) -> Response {
    let expected = format!("Bearer {TOKEN}");
    if bearer(&headers).as_deref() != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response();
    }
    Json(json!({ "id": 1, "email": "admin@example.com", "role": "admin" })).into_response()
}

async fn upload(mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
            return Json(json!({ "filename": filename, "size": size })).into_response();
        }
    }
    (StatusCode::BAD_REQUEST, Json(json!({ "message": "missing file" }))).into_response()
}

async fn export(uri: Uri) -> Response {
    let body = format!("export {}?{}", uri.path(), uri.query().unwrap_or_default());
    ([(CONTENT_TYPE, "application/octet-stream")], body).into_response()
}

async fn graphql(Json(request): Json<Value>) -> Json<Value> {
    let query = request["query"].as_str().unwrap_or_default();
    if query.contains("broken") {
        Json(json!({ "data": null, "errors": [{ "message": "Cannot query field \"broken\"" }] }))
    } else {
        Json(json!({ "data": { "posts": [{ "id": 1 }] }, "errors": [] }))
    }
}

async fn ws_handler(State(state): State<MockState>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    state.ws_auth.lock().unwrap().push(bearer(&headers));
    // Subscribe before the upgrade completes so pushes sent right after the
    // client sees the socket open are not missed.
    let push_rx = state.ws_push.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, state, push_rx))
}

async fn handle_socket(socket: WebSocket, state: MockState, mut push_rx: broadcast::Receiver<WsPush>) {
    state.ws_connections.fetch_add(1, Ordering::SeqCst);
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            push = push_rx.recv() => match push {
                Ok(WsPush::Text(text)) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(WsPush::Close) => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let frame = serde_json::from_str(text.as_str())
                        .unwrap_or_else(|_| Value::String(text.to_string()));
                    let _ = state.ws_frames.send(frame);
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }
}

async fn sse_handler(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    state.sse_requests.lock().unwrap().push(SseRequest {
        query,
        last_event_id: headers
            .get("last-event-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        authorization: bearer(&headers),
    });

    let rx = state.sse_push.subscribe();
    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(SsePush::Data { id, data }) => {
                    let mut event = Event::default().data(data);
                    if let Some(id) = id {
                        event = event.id(id);
                    }
                    return Some((Ok(event), rx));
                }
                Ok(SsePush::Close) | Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    });
    Sse::new(events)
}
