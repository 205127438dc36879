//! Request descriptors and decoded responses for the HTTP core.

use apexkit_shared::encode_query_value;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::Form;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Body of an outgoing request.
#[derive(Debug)]
pub enum RequestBody {
    /// Sent as `application/json`.
    Json(Value),
    /// Sent as-is; the boundary content type is assigned by the transport.
    Multipart(Form),
}

/// One REST call: method, headers, body, query and whether to skip `/api/v1`.
#[derive(Debug, Default)]
pub struct RequestOptions {
    pub(crate) method: Method,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<RequestBody>,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) root: bool,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Serialize a typed body.
    pub fn json_body<T: Serialize>(self, body: &T) -> Result<Self, ApiError> {
        Ok(self.json(serde_json::to_value(body)?))
    }

    pub fn multipart(mut self, form: Form) -> Self {
        self.body = Some(RequestBody::Multipart(form));
        self
    }

    /// Add one query parameter; null values are dropped.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Some(encoded) = encode_query_value(key, &value.into()) {
            self.params.push((key.to_string(), encoded));
        }
        self
    }

    /// Add every field of a serializable options struct as query parameters.
    pub fn params<T: Serialize>(mut self, options: &T) -> Result<Self, ApiError> {
        if let Value::Object(map) = serde_json::to_value(options)? {
            self = self.param_map(map);
        }
        Ok(self)
    }

    pub fn param_map(mut self, map: Map<String, Value>) -> Self {
        for (key, value) in map {
            self = self.param(&key, value);
        }
        self
    }

    /// Bypass the `/api/v1` prefix (e.g. `/graphql`).
    pub fn root(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.params
    }
}

/// A successful response, decoded by content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// 204 No Content or an empty body.
    Empty,
    /// `text/plain` or `text/html`.
    Text(String),
    Json(Value),
}

impl ApiResponse {
    /// Decode into a typed value. `Empty` decodes from `null`, `Text` from a JSON string.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let value = match self {
            ApiResponse::Empty => Value::Null,
            ApiResponse::Text(text) => Value::String(text),
            ApiResponse::Json(value) => value,
        };
        Ok(serde_json::from_value(value)?)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ApiResponse::Empty)
    }
}
