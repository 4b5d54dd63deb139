//! End-to-end exercise of the HTTP surface against mocked Qdrant and chat endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, Response, StatusCode},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::{Method::GET, Method::POST, Method::PUT, MockServer};
use ragmill::api::create_router;
use ragmill::app::AppService;
use ragmill::config::{CONFIG, Config, EmbeddingProvider};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn install_config(server: &MockServer) {
    let _ = CONFIG.set(Config {
        qdrant_url: server.base_url(),
        qdrant_api_key: None,
        embedding_provider: EmbeddingProvider::Deterministic,
        embedding_model: "test-model".into(),
        embedding_dimension: 8,
        openai_base_url: Some(server.base_url()),
        openai_api_key: None,
        chat_model: "test-chat-model".into(),
        chunk_size: 200,
        chunk_overlap: 40,
        search_default_limit: 5,
        search_max_limit: 50,
        search_default_score_threshold: 0.25,
        queue_capacity: 8,
        server_port: None,
    });
}

fn mock_vector_store(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET)
            .path_matches(regex::Regex::new("^/collections/tenant_[^/]+$").unwrap());
        then.status(404).body("not found");
    });
    server.mock(|when, then| {
        when.method(PUT)
            .path_matches(regex::Regex::new("^/collections/tenant_[^/]+$").unwrap());
        then.status(200)
            .json_body(json!({ "status": "ok", "time": 0.0, "result": true }));
    });
    server.mock(|when, then| {
        when.method(PUT)
            .path_matches(regex::Regex::new("^/collections/tenant_[^/]+/points$").unwrap());
        then.status(200).json_body(json!({
            "status": "ok", "time": 0.0,
            "result": { "operation_id": 1, "status": "completed" }
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path_matches(regex::Regex::new("^/collections/tenant_[^/]+/points/delete$").unwrap());
        then.status(200).json_body(json!({
            "status": "ok", "time": 0.0,
            "result": { "operation_id": 2, "status": "completed" }
        }));
    });
}

fn mock_retrieval(server: &MockServer, document_id: Uuid) {
    server.mock(|when, then| {
        when.method(POST)
            .path_matches(regex::Regex::new("^/collections/tenant_[^/]+/points/query$").unwrap());
        then.status(200).json_body(json!({
            "status": "ok", "time": 0.0,
            "result": [
                {
                    "id": Uuid::new_v4().to_string(),
                    "score": 0.82,
                    "payload": {
                        "content": "Returns are accepted within 30 days of purchase.",
                        "document_id": document_id.to_string(),
                        "document_title": "policies",
                        "chunk_index": 0,
                        "language": "en"
                    }
                }
            ]
        }));
    });
}

fn mock_chat(server: &MockServer) {
    // Distinct matchers per prompt kind so summary, tags, and answers never collide.
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("Summarize");
        then.status(200).json_body(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Company return policy overview." } }
            ],
            "usage": { "prompt_tokens": 30, "completion_tokens": 8 }
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("topic tags");
        then.status(200).json_body(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "returns, policies" } }
            ]
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("Context:");
        then.status(200).json_body(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Returns are accepted within 30 days." } }
            ],
            "usage": { "prompt_tokens": 60, "completion_tokens": 10 }
        }));
    });
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    router
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("router response")
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn wait_for_status(router: &Router, document_id: &str, expected: &str) -> Value {
    for _ in 0..200 {
        let response = send(
            router,
            Method::GET,
            &format!("/documents/{document_id}"),
            None,
        )
        .await;
        if response.status() == StatusCode::OK {
            let document = body_json(response).await;
            let status = document["status"].as_str().unwrap_or_default().to_string();
            if status == expected {
                return document;
            }
            if expected != "failed" {
                assert_ne!(status, "failed", "document unexpectedly failed: {document}");
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("document {document_id} never reached status {expected}");
}

#[tokio::test]
async fn upload_index_ask_and_delete_round_trip() {
    let server = MockServer::start_async().await;
    install_config(&server);
    mock_vector_store(&server);
    mock_chat(&server);

    let service = AppService::from_config().expect("service");
    let router = create_router(Arc::new(service));
    let tenant_id = Uuid::new_v4();

    // Upload a plain-text document and let the background queue process it.
    let upload = send(
        &router,
        Method::POST,
        "/documents",
        Some(json!({
            "tenant_id": tenant_id,
            "filename": "policies.txt",
            "content_base64": STANDARD.encode(
                "Returns are accepted within 30 days of purchase. \
                 Refunds are issued to the original payment method. \
                 Contact support for damaged items."
            ),
            "language": "en"
        })),
    )
    .await;
    assert_eq!(upload.status(), StatusCode::ACCEPTED);
    let uploaded = body_json(upload).await;
    let document_id = uploaded["id"].as_str().expect("document id").to_string();

    let processed = wait_for_status(&router, &document_id, "processed").await;
    assert!(processed["chunk_count"].as_u64().expect("chunk count") >= 1);
    assert_eq!(processed["is_embedded"], true);
    assert_eq!(processed["summary"], "Company return policy overview.");
    assert_eq!(processed["tags"], json!(["returns", "policies"]));

    // Ask a question grounded in the indexed content.
    mock_retrieval(&server, Uuid::parse_str(&document_id).expect("uuid"));
    let ask = send(
        &router,
        Method::POST,
        "/ask",
        Some(json!({
            "tenant_id": tenant_id,
            "query": "What is the refund policy?",
            "language": "en"
        })),
    )
    .await;
    assert_eq!(ask.status(), StatusCode::OK);
    let answer = body_json(ask).await;
    assert_eq!(answer["answer"], "Returns are accepted within 30 days.");
    assert_eq!(answer["is_successful"], true);
    assert!(answer["confidence"].as_f64().expect("confidence") > 0.0);
    assert_eq!(answer["sources"].as_array().expect("sources").len(), 1);

    // An unsupported format is still admitted; the pipeline fails it with a
    // reason the caller can poll, it never reaches `processed`.
    let other_tenant = Uuid::new_v4();
    let unsupported = send(
        &router,
        Method::POST,
        "/documents",
        Some(json!({
            "tenant_id": other_tenant,
            "filename": "binary.xyz",
            "content_base64": STANDARD.encode(b"opaque bytes")
        })),
    )
    .await;
    assert_eq!(unsupported.status(), StatusCode::ACCEPTED);
    let unsupported_id = body_json(unsupported).await["id"]
        .as_str()
        .expect("document id")
        .to_string();

    let failed = wait_for_status(&router, &unsupported_id, "failed").await;
    assert!(
        failed["error"]
            .as_str()
            .expect("failure reason")
            .contains("unsupported file format")
    );
    assert_eq!(failed["is_embedded"], false);

    let listing = send(
        &router,
        Method::GET,
        &format!("/documents?tenant_id={tenant_id}"),
        None,
    )
    .await;
    let documents = body_json(listing).await;
    assert_eq!(documents.as_array().expect("document list").len(), 1);

    // Deletion removes the record and its vectors.
    let deleted = send(
        &router,
        Method::DELETE,
        &format!("/documents/{document_id}"),
        None,
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let missing = send(
        &router,
        Method::GET,
        &format!("/documents/{document_id}"),
        None,
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
