use apexkit_shared::{file_url, FileInfo, ListResponse};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::api_client::ApiClient;
use crate::error::ApiError;
use crate::request::RequestOptions;

/// Stored files.
pub struct Files<'a> {
    pub(crate) client: &'a ApiClient,
}

impl Files<'_> {
    pub async fn list(&self, page: u32, per_page: u32) -> Result<ListResponse<FileInfo>, ApiError> {
        self.client
            .request_json(
                "/storage/files",
                RequestOptions::get().param("page", page).param("per_page", per_page),
            )
            .await
    }

    /// Upload `contents` as a multipart `file` field.
    pub async fn upload(&self, filename: &str, contents: Vec<u8>) -> Result<Value, ApiError> {
        let part = Part::bytes(contents).file_name(filename.to_string());
        self.client
            .request_json(
                "/storage/upload",
                RequestOptions::post().multipart(Form::new().part("file", part)),
            )
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/storage/files/{id}")).await
    }

    /// Public URL of a file in this client's context.
    pub fn file_url(&self, filename: &str) -> String {
        file_url(self.client.base_url(), filename)
    }
}
