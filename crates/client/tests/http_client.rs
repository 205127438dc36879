mod common;

use apexkit_client::shared::{ListOptions, RelationRequest};
use apexkit_client::{ApiClient, ApiError, ApiResponse, RequestOptions};
use common::{MockBackend, TOKEN};
use serde_json::{json, Value};

#[tokio::test]
async fn error_body_surfaces_message_status_code_and_details() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let err = client.get_json::<Value>("/missing").await.unwrap_err();
    assert_eq!(err.to_string(), "not found");
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.code(), Some("NOT_FOUND"));
    assert_eq!(err.details(), Some(&json!({ "id": 99 })));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn no_content_resolves_to_empty() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let response = client.request("/empty", RequestOptions::get()).await.unwrap();
    assert!(response.is_empty());
    let decoded: Option<Value> = response.into_json().unwrap();
    assert_eq!(decoded, None);
}

#[tokio::test]
async fn text_responses_are_returned_raw() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    match client.request("/text", RequestOptions::get()).await.unwrap() {
        ApiResponse::Text(text) => assert_eq!(text, "hello"),
        other => panic!("expected text, got {other:?}"),
    }
    match client.request("/html", RequestOptions::get()).await.unwrap() {
        ApiResponse::Text(text) => assert_eq!(text, "<p>hi</p>"),
        other => panic!("expected text, got {other:?}"),
    }
}

#[tokio::test]
async fn failing_text_and_empty_responses_still_raise() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let err = client.request("/text-error", RequestOptions::get()).await.unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(err.status(), Some(500));

    let err = client.request("/blank-error", RequestOptions::get()).await.unwrap_err();
    assert_eq!(err.to_string(), "API Error");
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn json_message_in_text_error_body_is_used() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let err = client.request("/text-json-error", RequestOptions::get()).await.unwrap_err();
    assert_eq!(err.to_string(), "Rate limit exceeded");
    assert_eq!(err.status(), Some(429));
}

#[tokio::test]
async fn graphql_errors_raise_and_data_passes_through() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let err = client
        .graphql::<Value>("{ broken }", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::GraphQl { .. }));
    assert_eq!(err.to_string(), "Cannot query field \"broken\"");

    let ok: Value = client.graphql("{ posts { id } }", json!({})).await.unwrap();
    assert_eq!(ok["data"]["posts"][0]["id"], 1);
}

#[tokio::test]
async fn requests_carry_prefix_bearer_token_and_query() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);
    client.set_token(TOKEN);

    let options = ListOptions::default()
        .page(2, 50)
        .sort("-created")
        .filter(json!({ "status": "draft" }));
    let echo: Value = client
        .request_json("/collections/posts/records", RequestOptions::get().params(&options).unwrap())
        .await
        .unwrap();

    assert_eq!(echo["path"], "/api/v1/collections/posts/records");
    assert_eq!(echo["authorization"], format!("Bearer {TOKEN}"));
    let query = echo["query"].as_str().unwrap();
    assert!(query.contains("page=2"));
    assert!(query.contains("per_page=50"));
    assert!(query.contains("sort=-created"));
    assert!(query.contains("filter=%7B%22status%22%3A%22draft%22%7D"));
}

#[tokio::test]
async fn anonymous_requests_have_no_authorization() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let echo: Value = client.get_json("/collections").await.unwrap();
    assert_eq!(echo["authorization"], Value::Null);
}

#[tokio::test]
async fn tenant_context_routes_under_its_prefix_with_copied_token() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);
    client.set_token("T");

    let tenant = client.tenant("acme");
    let echo: Value = tenant
        .request_json("/collections/3/records", RequestOptions::get())
        .await
        .unwrap();
    assert_eq!(echo["path"], "/tenant/acme/api/v1/collections/3/records");
    assert_eq!(echo["authorization"], "Bearer T");

    let root: Value = client.get_json("/collections").await.unwrap();
    assert_eq!(root["path"], "/api/v1/collections");
}

#[tokio::test]
async fn login_stores_session_for_later_calls() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let err = client.auth().get_me().await.unwrap_err();
    assert!(err.is_unauthorized());

    let auth = client.auth().login("admin@example.com", "secret").await.unwrap();
    assert_eq!(auth.token, TOKEN);
    assert_eq!(client.token().as_deref(), Some(TOKEN));
    assert_eq!(client.current_user().unwrap().email, "admin@example.com");

    let me = client.auth().get_me().await.unwrap();
    assert_eq!(me.id, 1);

    client.auth().logout();
    assert!(client.auth().get_me().await.unwrap_err().is_unauthorized());
}

#[tokio::test]
async fn failed_login_keeps_previous_session() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);
    client.set_token("old");

    let err = client.auth().login("admin@example.com", "wrong").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(client.token().as_deref(), Some("old"));
}

#[tokio::test]
async fn upload_sends_multipart_file() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let res = client
        .files()
        .upload("avatar.png", vec![1, 2, 3, 4])
        .await
        .unwrap();
    assert_eq!(res, json!({ "filename": "avatar.png", "size": 4 }));
}

#[tokio::test]
async fn record_writes_wrap_data_and_relations_send_body_on_delete() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let echo: Value = client
        .request_json(
            "/collections/3/records",
            RequestOptions::post().json(json!({ "data": { "title": "Hello" } })),
        )
        .await
        .unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["body"], json!({ "data": { "title": "Hello" } }));

    let relation = RelationRequest {
        target_collection_id: 4,
        target_record_id: 8,
        relation_name: "author".into(),
    };
    client.collection(3).remove_relation(12, &relation).await.unwrap();
}

#[tokio::test]
async fn export_returns_raw_bytes_with_format() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let bytes = client.admins().export_data(5, "csv").await.unwrap();
    assert_eq!(bytes, b"export /api/v1/admin/export-data/5?format=csv".to_vec());
}

#[tokio::test]
async fn config_keys_are_percent_encoded() {
    let backend = MockBackend::start().await;
    let client = ApiClient::new(&backend.base_url);

    let echo: Value = client
        .request_json("/admin/config/smtp%20host", RequestOptions::delete())
        .await
        .unwrap();
    assert_eq!(echo["path"], "/api/v1/admin/config/smtp%20host");
    client.admins().delete_config("smtp host").await.unwrap();
}
