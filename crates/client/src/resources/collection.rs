use apexkit_shared::{ListOptions, ListResponse, Record, RelationRequest};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::api_client::ApiClient;
use crate::error::ApiError;
use crate::request::RequestOptions;

/// Records of a single collection.
pub struct CollectionHandle<'a> {
    pub(crate) client: &'a ApiClient,
    /// `/collections/{id}`
    pub(crate) path: String,
}

impl CollectionHandle<'_> {
    fn records(&self) -> String {
        format!("{}/records", self.path)
    }

    fn record(&self, record_id: i64) -> String {
        format!("{}/records/{record_id}", self.path)
    }

    pub async fn list(&self, options: &ListOptions) -> Result<ListResponse<Record>, ApiError> {
        self.client
            .request_json(&self.records(), RequestOptions::get().params(options)?)
            .await
    }

    pub async fn get(&self, record_id: i64, options: &ListOptions) -> Result<Record, ApiError> {
        self.client
            .request_json(&self.record(record_id), RequestOptions::get().params(options)?)
            .await
    }

    /// Create a record; `data` becomes the record's field map.
    pub async fn create<T: Serialize>(&self, data: &T) -> Result<Record, ApiError> {
        self.client
            .post_json(&self.records(), &json!({ "data": serde_json::to_value(data)? }))
            .await
    }

    pub async fn update<T: Serialize>(&self, record_id: i64, data: &T) -> Result<Record, ApiError> {
        self.client
            .put_json(&self.record(record_id), &json!({ "data": serde_json::to_value(data)? }))
            .await
    }

    pub async fn patch<T: Serialize>(&self, record_id: i64, data: &T) -> Result<Record, ApiError> {
        self.client
            .patch_json(&self.record(record_id), &json!({ "data": serde_json::to_value(data)? }))
            .await
    }

    pub async fn delete(&self, record_id: i64) -> Result<(), ApiError> {
        self.client.delete(&self.record(record_id)).await
    }

    // --- Search ---

    /// Run a read-only SQL query scoped to this collection.
    pub async fn search_with_sql<T: DeserializeOwned>(&self, query: &str) -> Result<T, ApiError> {
        self.client
            .post_json(&format!("{}/query", self.path), &json!({ "query": query }))
            .await
    }

    /// Full-text search.
    pub async fn search<T: DeserializeOwned>(&self, query: &str) -> Result<T, ApiError> {
        self.client
            .request_json(
                &format!("{}/search", self.path),
                RequestOptions::get().param("q", query),
            )
            .await
    }

    /// Prefix search meant for search-as-you-type.
    pub async fn instant_search<T: DeserializeOwned>(&self, query: &str) -> Result<T, ApiError> {
        self.client
            .request_json(
                &format!("{}/instant-search", self.path),
                RequestOptions::get().param("q", query),
            )
            .await
    }

    pub async fn search_vector<T: DeserializeOwned>(
        &self,
        field: &str,
        vector: &[f32],
        limit: u32,
    ) -> Result<T, ApiError> {
        self.client
            .post_json(
                &format!("{}/search-vector", self.path),
                &json!({ "field": field, "vector": vector, "limit": limit }),
            )
            .await
    }

    pub async fn search_text_vector<T: DeserializeOwned>(&self, query_text: &str, limit: u32) -> Result<T, ApiError> {
        self.client
            .post_json(
                &format!("{}/search-text-vector", self.path),
                &json!({ "query_text": query_text, "limit": limit }),
            )
            .await
    }

    // --- Relations ---

    pub async fn add_relation(&self, origin_record_id: i64, relation: &RelationRequest) -> Result<Value, ApiError> {
        self.client
            .post_json(&format!("{}/relations", self.record(origin_record_id)), relation)
            .await
    }

    pub async fn remove_relation(&self, origin_record_id: i64, relation: &RelationRequest) -> Result<(), ApiError> {
        self.client
            .request(
                &format!("{}/relations", self.record(origin_record_id)),
                RequestOptions::delete().json_body(relation)?,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_scoped_to_the_collection() {
        let client = ApiClient::new("http://localhost:5000");
        let posts = client.collection(7);
        assert_eq!(posts.records(), "/collections/7/records");
        assert_eq!(posts.record(42), "/collections/7/records/42");

        let by_name = client.collection("posts");
        assert_eq!(by_name.path, "/collections/posts");
    }
}
