//! HTTP API client for an ApexKit backend, scoped to one context
//! (root, tenant or sandbox).

use std::sync::{Arc, PoisonError, RwLock};

use apexkit_shared::{api_path, sandbox_url, tenant_url, trim_base_url, try_error_message, ErrorBody, User};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::request::{ApiResponse, RequestBody, RequestOptions};
use crate::sse::SseClient;
use crate::ws::RealtimeClient;

#[derive(Debug, Clone, Default)]
struct Session {
    token: Option<String>,
    current_user: Option<User>,
}

/// HTTP client bound to a single base URL.
///
/// Clones share auth state (same context). [`ApiClient::tenant`] and
/// [`ApiClient::sandbox`] produce independent instances instead.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    sandbox_id: Option<String>,
    session: Arc<RwLock<Session>>,
}

impl ApiClient {
    /// Create a client for the given base URL (trailing slashes are dropped).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: Client::new(),
            base_url: trim_base_url(&base_url).to_string(),
            sandbox_id: None,
            session: Arc::new(RwLock::new(Session::default())),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let client = Self::new(config.base_url.clone());
        if let Some(token) = &config.token {
            client.set_token(token.clone());
        }
        client
    }

    /// Use a preconfigured reqwest client (timeouts, proxies, TLS).
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sandbox_id(&self) -> Option<&str> {
        self.sandbox_id.as_deref()
    }

    pub fn token(&self) -> Option<String> {
        self.read_session().token.clone()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.write_session().token = Some(token.into());
    }

    pub fn clear_token(&self) {
        self.write_session().token = None;
    }

    pub fn current_user(&self) -> Option<User> {
        self.read_session().current_user.clone()
    }

    pub(crate) fn store_session(&self, token: String, user: User) {
        let mut session = self.write_session();
        session.token = Some(token);
        session.current_user = Some(user);
    }

    pub(crate) fn clear_session(&self) {
        *self.write_session() = Session::default();
    }

    fn read_session(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy the current auth state into a new, unshared session.
    fn derive(&self, base_url: String, sandbox_id: Option<String>) -> Self {
        let session = self.read_session().clone();
        Self {
            http: self.http.clone(),
            base_url,
            sandbox_id,
            session: Arc::new(RwLock::new(session)),
        }
    }

    /// A client routed to `{base_url}/tenant/{tenant_id}`.
    pub fn tenant(&self, tenant_id: &str) -> Self {
        self.derive(tenant_url(&self.base_url, tenant_id), None)
    }

    /// A client routed to `{base_url}/sandbox/{sandbox_id}`.
    pub fn sandbox(&self, sandbox_id: &str) -> Self {
        self.derive(
            sandbox_url(&self.base_url, sandbox_id),
            Some(sandbox_id.to_string()),
        )
    }

    /// Realtime socket client for this context, using the current token.
    pub fn realtime(&self) -> RealtimeClient {
        RealtimeClient::new(&self.base_url, self.token())
    }

    /// Realtime socket client for this context with explicit settings.
    pub fn realtime_with(&self, config: &ClientConfig) -> RealtimeClient {
        RealtimeClient::with_config(&self.base_url, self.token(), config)
    }

    /// Server-sent events client for this context.
    pub fn sse(&self) -> SseClient {
        SseClient::new(&self.base_url, self.token()).with_http_client(self.http.clone())
    }

    fn build_url(&self, endpoint: &str, options: &RequestOptions) -> Result<url::Url, ApiError> {
        let path = api_path(endpoint, options.root);
        let mut url = url::Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| ApiError::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))?;
        if !options.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&options.params);
        }
        Ok(url)
    }

    fn prepare(&self, endpoint: &str, options: RequestOptions) -> Result<(reqwest::RequestBuilder, bool), ApiError> {
        let url = self.build_url(endpoint, &options)?;
        tracing::debug!("{} {}", options.method, url);

        let mut rb = self.http.request(options.method, url).headers(options.headers);
        if let Some(token) = self.token() {
            rb = rb.bearer_auth(token);
        }
        rb = match options.body {
            Some(RequestBody::Json(body)) => rb.json(&body),
            Some(RequestBody::Multipart(form)) => rb.multipart(form),
            None => rb,
        };
        Ok((rb, options.root))
    }

    /// Perform one authenticated call and normalize the result.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<ApiResponse, ApiError> {
        let (rb, root) = self.prepare(endpoint, options)?;
        let resp = rb.send().await?;
        read_response(resp, root).await
    }

    /// Perform a call and decode the body into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.request(endpoint, options).await?.into_json()
    }

    /// Perform a call and return the raw body bytes (exports, downloads).
    pub async fn download(&self, endpoint: &str, options: RequestOptions) -> Result<Vec<u8>, ApiError> {
        let (rb, _) = self.prepare(endpoint, options)?;
        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                code: None,
                message: format!(
                    "Download failed: {}",
                    status.canonical_reason().unwrap_or("unknown status")
                ),
                details: None,
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json(path, RequestOptions::get()).await
    }

    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        self.request_json(path, RequestOptions::post().json_body(body)?).await
    }

    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        self.request_json(path, RequestOptions::put().json_body(body)?).await
    }

    pub async fn patch_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        self.request_json(path, RequestOptions::patch().json_body(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request(path, RequestOptions::delete()).await?;
        Ok(())
    }

    /// Run a GraphQL query against the root `/graphql` endpoint.
    pub async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, ApiError> {
        let variables = if variables.is_null() { json!({}) } else { variables };
        self.request_json(
            "/graphql",
            RequestOptions::post()
                .root()
                .json(json!({ "query": query, "variables": variables })),
        )
        .await
    }
}

/// Normalize a response: 204 → empty, text types → raw text, otherwise JSON
/// with error surfacing for non-2xx statuses and root-level `errors`.
async fn read_response(resp: Response, root: bool) -> Result<ApiResponse, ApiError> {
    let status = resp.status();
    if status == StatusCode::NO_CONTENT {
        return Ok(ApiResponse::Empty);
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("text/plain") || content_type.contains("text/html") {
        let text = resp.text().await?;
        if !status.is_success() {
            let message = match try_error_message(&text) {
                Some(message) => message,
                None if text.is_empty() => "API Error".to_string(),
                None => text,
            };
            return Err(ApiError::Http {
                status: status.as_u16(),
                code: None,
                message,
                details: None,
            });
        }
        return Ok(ApiResponse::Text(text));
    }

    let bytes = resp.bytes().await?;
    if bytes.is_empty() {
        if status.is_success() {
            return Ok(ApiResponse::Empty);
        }
        return Err(http_error(status, ErrorBody::default()));
    }

    let data: Value = match serde_json::from_slice(&bytes) {
        Ok(data) => data,
        Err(_) if !status.is_success() => return Err(http_error(status, ErrorBody::default())),
        Err(e) => return Err(ApiError::Json(e)),
    };

    if root {
        if let Some(errors) = data.get("errors").filter(|e| has_errors(e)) {
            let message = errors
                .get(0)
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("GraphQL Error")
                .to_string();
            return Err(ApiError::GraphQl {
                message,
                details: errors.clone(),
            });
        }
    }

    if !status.is_success() {
        return Err(http_error(status, ErrorBody::from_value(data)));
    }

    Ok(ApiResponse::Json(data))
}

fn has_errors(errors: &Value) -> bool {
    match errors {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn http_error(status: StatusCode, body: ErrorBody) -> ApiError {
    ApiError::Http {
        status: status.as_u16(),
        code: body.error,
        message: body.message.unwrap_or_else(|| "API Error".to_string()),
        details: body.details,
    }
}
