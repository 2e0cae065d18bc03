//! Shared fixtures for tests that drive `ApiClient` against a wiremock server.

#![allow(dead_code)]

use std::time::Duration;

use nebuia_copilot::ApiClient;
use serde_json::{json, Value};
use wiremock::{MockServer, ResponseTemplate};

pub const KEY: &str = "test-key";
pub const SECRET: &str = "test-secret";

/// Path prefix the mock API is mounted under, to check it survives URL building.
pub const PREFIX: &str = "/api/v1";

pub fn api_path(path: &str) -> String {
    format!("{PREFIX}{path}")
}

pub fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(KEY, SECRET, format!("{}{PREFIX}", server.uri()))
}

/// A client whose requests give up after `timeout`.
pub fn impatient_client(server: &MockServer, timeout: Duration) -> ApiClient {
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("failed to build http client");
    ApiClient::with_http_client(KEY, SECRET, format!("{}{PREFIX}", server.uri()), http)
}

pub fn ok(payload: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"status": true, "payload": payload}))
}

pub fn rejected(payload: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"status": false, "payload": payload}))
}

pub fn document_json(uuid: &str, status: &str) -> Value {
    json!({
        "id": format!("id-{uuid}"),
        "batch_id": "batch-1",
        "user": "user-1",
        "uuid": uuid,
        "url": format!("https://files.example/{uuid}.pdf"),
        "file_name": format!("{uuid}.pdf"),
        "type_document": "invoice",
        "status_document": status,
        "uploaded": "2024-07-27T10:15:00Z",
        "reviewed_at": "0001-01-01T00:00:00Z",
        "source_type": "file"
    })
}
