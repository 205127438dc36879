use apexkit_shared::{Collection, ListResponse, User};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::api_client::ApiClient;
use crate::error::ApiError;
use crate::request::RequestOptions;

/// Administrative endpoints: schema, configuration, users, storage and
/// maintenance jobs. Requires an admin token.
pub struct Admins<'a> {
    pub(crate) client: &'a ApiClient,
}

impl Admins<'_> {
    // --- Collections ---

    pub async fn list_collections(&self) -> Result<Vec<Collection>, ApiError> {
        self.client.get_json("/collections").await
    }

    pub async fn create_collection(&self, name: &str, schema: Value) -> Result<Collection, ApiError> {
        self.client
            .post_json("/collections", &json!({ "name": name, "schema": schema }))
            .await
    }

    pub async fn get_collection(&self, id: i64) -> Result<Collection, ApiError> {
        self.client.get_json(&format!("/collections/{id}")).await
    }

    pub async fn update_collection<T: Serialize>(&self, id: i64, payload: &T) -> Result<Collection, ApiError> {
        self.client.put_json(&format!("/collections/{id}"), payload).await
    }

    pub async fn patch_collection<T: Serialize>(&self, id: i64, payload: &T) -> Result<Collection, ApiError> {
        self.client.patch_json(&format!("/collections/{id}"), payload).await
    }

    pub async fn delete_collection(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/collections/{id}")).await
    }

    // --- Configs ---

    pub async fn list_configs(&self) -> Result<Value, ApiError> {
        self.client.get_json("/admin/config").await
    }

    pub async fn set_config(&self, key: &str, value: &str, encrypt: bool) -> Result<Value, ApiError> {
        self.client
            .post_json(
                "/admin/config",
                &json!({ "key": key, "value": value, "encrypt": encrypt }),
            )
            .await
    }

    pub async fn delete_config(&self, key: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("/admin/config/{}", urlencoding::encode(key)))
            .await
    }

    // --- Users ---

    pub async fn list_users<Q: Serialize>(&self, options: &Q) -> Result<ListResponse<User>, ApiError> {
        self.client
            .request_json("/admin/users", RequestOptions::get().params(options)?)
            .await
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/admin/users/{id}")).await
    }

    // --- Settings ---

    pub async fn get_settings<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        self.client.get_json("/admin/settings").await
    }

    pub async fn update_settings<T: Serialize>(&self, settings: &T) -> Result<Value, ApiError> {
        self.client.put_json("/admin/settings", settings).await
    }

    pub async fn patch_settings<T: Serialize>(&self, settings: &T) -> Result<Value, ApiError> {
        self.client.patch_json("/admin/settings", settings).await
    }

    // --- Storage ---

    pub async fn test_s3_storage_connection<T: Serialize>(&self, config: &T) -> Result<Value, ApiError> {
        self.client.post_json("/admin/storage/test", config).await
    }

    pub async fn migrate_storage(&self, source: &str, destination: &str) -> Result<Value, ApiError> {
        self.client
            .post_json(
                "/admin/storage/migrate",
                &json!({ "source": source, "destination": destination }),
            )
            .await
    }

    // --- Maintenance ---

    pub async fn reload_system(&self) -> Result<Value, ApiError> {
        self.client.post_json("/admin/system/reload", &json!({})).await
    }

    pub async fn reindex(&self, collection_id: i64) -> Result<Value, ApiError> {
        self.client
            .post_json(&format!("/admin/collections/{collection_id}/reindex"), &json!({}))
            .await
    }

    pub async fn revectorize_collection(&self, collection_id: i64) -> Result<Value, ApiError> {
        self.client
            .post_json(
                &format!("/admin/collections/{collection_id}/revectorize"),
                &json!({ "force": false }),
            )
            .await
    }

    /// Upload a data file into the named collection.
    pub async fn import_data(
        &self,
        collection_name: &str,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<Value, ApiError> {
        let form = Form::new()
            .text("collection_name", collection_name.to_string())
            .part("file", Part::bytes(contents).file_name(filename.to_string()));
        self.client
            .request_json("/admin/import-data", RequestOptions::post().multipart(form))
            .await
    }

    /// Raw export of a collection in `format` (`json`, `csv`, ...).
    pub async fn export_data(&self, collection_id: i64, format: &str) -> Result<Vec<u8>, ApiError> {
        self.client
            .download(
                &format!("/admin/export-data/{collection_id}"),
                RequestOptions::get().param("format", format),
            )
            .await
    }

    pub async fn get_dashboard_stats(&self) -> Result<Value, ApiError> {
        self.client.get_json("/admin/dashboard").await
    }

    // --- Tenants ---

    pub async fn create_tenant(&self, tenant_id: &str) -> Result<Value, ApiError> {
        self.client
            .post_json("/admin/tenants", &json!({ "tenant_id": tenant_id }))
            .await
    }

    pub async fn list_tenants(&self) -> Result<Value, ApiError> {
        self.client.get_json("/admin/tenants").await
    }
}
