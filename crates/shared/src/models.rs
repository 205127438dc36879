//! Data models for the ApexKit REST API and realtime protocol.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Identity ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl User {
    /// The local part of the email, used as a display name.
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

/// Returned by login and registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

// --- Records ---

/// A collection record, optionally carrying expanded relations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub expand: Map<String, Value>,
}

impl Record {
    /// Decode the record's `data` object into a concrete type.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    /// Look up a single field inside `data`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// An expanded relation, decoded.
    pub fn expanded<T: DeserializeOwned>(&self, relation: &str) -> Option<T> {
        self.expand
            .get(relation)
            .and_then(|v| T::deserialize(v).ok())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created.as_deref().and_then(parse_timestamp)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated.as_deref().and_then(parse_timestamp)
    }
}

/// Parse either RFC3339 or the SQLite `YYYY-MM-DD HH:MM:SS` form (assumed UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// A page of items as returned by list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

/// Query options for list endpoints (records, users).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    /// e.g. `-created`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    /// Structured filter, sent JSON-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    /// Comma separated relation names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,
}

impl ListOptions {
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationRequest {
    pub target_collection_id: i64,
    pub target_record_id: i64,
    pub relation_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub schema: Value,
}

// --- Storage ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileInfo {
    pub id: i64,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// --- AI ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSessionRequest {
    pub name: String,
    pub initial_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_record_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditCodeRequest {
    pub prompt: String,
    pub current_code: String,
    pub context_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

// --- Realtime ---

/// Database change kinds carried by realtime events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// What inbound events a realtime connection wants to receive.
///
/// Database matching (`collection_id`, `record_id`, `event_type`, `filter`)
/// and channel matching (`channel`, `custom_event`) are independent; the
/// server decides relevance per message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<ChangeKind>,
    /// Structured match against record data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_event: Option<String>,
}

impl SubscriptionFilter {
    pub fn for_collection(collection_id: i64) -> Self {
        Self {
            collection_id: Some(collection_id),
            ..Self::default()
        }
    }

    pub fn for_channel(channel: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            ..Self::default()
        }
    }

    pub fn record(mut self, record_id: i64) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn event_type(mut self, kind: ChangeKind) -> Self {
        self.event_type = Some(kind);
        self
    }

    pub fn matching(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn custom_event(mut self, event: impl Into<String>) -> Self {
        self.custom_event = Some(event.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Payload of an application-level broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalPayload {
    pub channel: String,
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchPayload {
    pub collection_id: i64,
    pub query: String,
    pub limit: u32,
    pub request_id: String,
}

/// Frames sent from the client over the realtime socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum ClientFrame {
    Subscribe(SubscriptionFilter),
    Unsubscribe,
    Signal(SignalPayload),
    Search(SearchPayload),
}

/// A database change notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangePayload {
    pub record_id: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
}

/// Broadcast events pushed by the server (database changes and signals).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
    Insert(ChangePayload),
    Update(ChangePayload),
    Delete(ChangePayload),
    Custom(SignalPayload),
}

impl ServerEvent {
    /// The change kind for database events, `None` for signals.
    pub fn change_kind(&self) -> Option<ChangeKind> {
        match self {
            ServerEvent::Insert(_) => Some(ChangeKind::Insert),
            ServerEvent::Update(_) => Some(ChangeKind::Update),
            ServerEvent::Delete(_) => Some(ChangeKind::Delete),
            ServerEvent::Custom(_) => None,
        }
    }

    pub fn change(&self) -> Option<&ChangePayload> {
        match self {
            ServerEvent::Insert(p) | ServerEvent::Update(p) | ServerEvent::Delete(p) => Some(p),
            ServerEvent::Custom(_) => None,
        }
    }

    pub fn signal(&self) -> Option<&SignalPayload> {
        match self {
            ServerEvent::Custom(s) => Some(s),
            _ => None,
        }
    }
}

/// Reply to a correlated `Search` frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    /// Echoed correlation id; numeric or boolean ids are kept as their JSON text.
    #[serde(deserialize_with = "scalar_as_string")]
    pub request_id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        scalar @ (Value::Number(_) | Value::Bool(_)) => Ok(scalar.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "request_id must be a scalar, got {other}"
        ))),
    }
}

impl SearchResponse {
    pub fn is_error(&self) -> bool {
        self.kind.as_deref() == Some("Error")
    }

    /// Split into the result rows or the server's error message.
    pub fn into_result(self) -> Result<Vec<Value>, String> {
        if self.is_error() {
            return Err(self
                .message
                .unwrap_or_else(|| "Search failed".to_string()));
        }
        Ok(self.results.unwrap_or_default())
    }
}
