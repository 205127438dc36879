use serde::Serialize;
use serde_json::Value;

use crate::api_client::ApiClient;
use crate::error::ApiError;

/// Server-side scripts.
pub struct Scripts<'a> {
    pub(crate) client: &'a ApiClient,
}

impl Scripts<'_> {
    pub async fn list(&self) -> Result<Value, ApiError> {
        self.client.get_json("/admin/scripts").await
    }

    pub async fn create<T: Serialize>(&self, script: &T) -> Result<Value, ApiError> {
        self.client.post_json("/admin/scripts", script).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/admin/scripts/{id}")).await
    }

    /// Execute the script named `name` with `variables` as its input.
    pub async fn run(&self, name: &str, variables: &Value) -> Result<Value, ApiError> {
        self.client.post_json(&format!("/run/{name}"), variables).await
    }
}

/// HTML templates rendered by the backend.
pub struct Templates<'a> {
    pub(crate) client: &'a ApiClient,
}

impl Templates<'_> {
    pub async fn list(&self) -> Result<Value, ApiError> {
        self.client.get_json("/admin/templates").await
    }

    pub async fn create<T: Serialize>(&self, template: &T) -> Result<Value, ApiError> {
        self.client.post_json("/admin/templates", template).await
    }

    pub async fn update<T: Serialize>(&self, id: i64, template: &T) -> Result<Value, ApiError> {
        self.client.put_json(&format!("/admin/templates/{id}"), template).await
    }

    pub async fn patch<T: Serialize>(&self, id: i64, template: &T) -> Result<Value, ApiError> {
        self.client.patch_json(&format!("/admin/templates/{id}"), template).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/admin/templates/{id}")).await
    }
}

/// Request and system logs.
pub struct Logs<'a> {
    pub(crate) client: &'a ApiClient,
}

impl Logs<'_> {
    pub async fn list(&self) -> Result<Value, ApiError> {
        self.client.get_json("/admin/logs").await
    }
}
