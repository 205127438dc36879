use apexkit_shared::{CreateSessionRequest, EditCodeRequest};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api_client::ApiClient;
use crate::error::ApiError;
use crate::request::RequestOptions;

/// AI actions and the schema architect sessions.
pub struct Ai<'a> {
    pub(crate) client: &'a ApiClient,
}

impl Ai<'_> {
    pub async fn get_actions(&self) -> Result<Value, ApiError> {
        self.client.get_json("/admin/ai/actions").await
    }

    pub async fn create_action<T: Serialize>(&self, action: &T) -> Result<Value, ApiError> {
        self.client.post_json("/admin/ai/actions", action).await
    }

    pub async fn delete_action(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/admin/ai/actions/{id}")).await
    }

    /// Run the action registered under `slug`.
    pub async fn run(&self, slug: &str, variables: Value) -> Result<Value, ApiError> {
        self.client
            .post_json(&format!("/ai/run/{slug}"), &json!({ "variables": variables }))
            .await
    }

    // --- Architect sessions ---

    pub async fn list_sessions(&self) -> Result<Value, ApiError> {
        self.client.get_json("/admin/ai/sessions").await
    }

    pub async fn create_session(&self, request: &CreateSessionRequest) -> Result<Value, ApiError> {
        self.client.post_json("/admin/ai/sessions", request).await
    }

    pub async fn chat(&self, session_id: &str, prompt: &str, model: Option<&str>) -> Result<Value, ApiError> {
        self.client
            .post_json(
                &format!("/admin/ai/sessions/{session_id}/chat"),
                &json!({ "prompt": prompt, "model": model }),
            )
            .await
    }

    pub async fn apply_session_changes(&self, session_id: &str) -> Result<Value, ApiError> {
        self.client
            .request_json(
                &format!("/admin/ai/sessions/{session_id}/apply"),
                RequestOptions::post(),
            )
            .await
    }

    pub async fn publish_session(&self, session_id: &str) -> Result<Value, ApiError> {
        self.client
            .request_json(
                &format!("/admin/ai/sessions/{session_id}/publish"),
                RequestOptions::post(),
            )
            .await
    }

    pub async fn list_plugins(&self) -> Result<Value, ApiError> {
        self.client.get_json("/ai/plugins").await
    }

    pub async fn edit_code(&self, request: &EditCodeRequest) -> Result<Value, ApiError> {
        self.client.post_json("/admin/ai/edit-code", request).await
    }
}
