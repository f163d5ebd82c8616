//! Common test utilities for hubot-audit integration tests
//!
//! This module provides:
//! - A wiremock search backend that accepts every index request
//! - Pipelines wired to that backend through the Elasticsearch client
//! - Shared message and HTTP exchange fixtures

use hubot_audit_core::{
    AuditGate, AuditPipeline, ChatMessage, ChatUser, ElasticsearchConfig,
    ElasticsearchIndexClient, HttpRequestDescriptor, IdentityTags, ListenerContext,
    SharedDisableFlag,
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ============================================================================
// Search Backend
// ============================================================================

/// Start a backend acknowledging every POST
pub async fn start_backend() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"_id": "doc-1", "result": "created"})),
        )
        .mount(&server)
        .await;

    server
}

/// Host and port of the backend, as an HTTP client would send in `host`
#[allow(dead_code)]
pub fn backend_host(server: &MockServer) -> String {
    server.address().to_string()
}

/// Requests the backend has received so far
pub async fn received(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

/// Wait until the backend has received at least `expected` requests
#[allow(dead_code)]
pub async fn wait_for_requests(server: &MockServer, expected: usize) -> Vec<Request> {
    for _ in 0..100 {
        let requests = received(server).await;
        if requests.len() >= expected {
            return requests;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "backend received {} requests, expected {}",
        received(server).await.len(),
        expected
    );
}

// ============================================================================
// Pipelines
// ============================================================================

/// Pipeline delivering to the backend, with the backend as audit endpoint
pub fn pipeline_for(server: &MockServer, flag: &SharedDisableFlag) -> Arc<AuditPipeline> {
    let config = ElasticsearchConfig::new(&server.uri(), "DEFAULT_GROUP").unwrap();
    let client = ElasticsearchIndexClient::new(config).unwrap();
    let gate = AuditGate::new(Some(server.uri()), Arc::new(flag.clone()));

    Arc::new(
        AuditPipeline::builder(gate, IdentityTags::default())
            .index_client(Arc::new(client))
            .build(),
    )
}

// ============================================================================
// Fixtures
// ============================================================================

/// The "Hello World" message from a user with a resolved email address
pub fn hello_world() -> ListenerContext {
    let user = ChatUser::named("Test User")
        .with_id("testuser")
        .with_room("testroom")
        .with_email_address("t@test.com");
    ChatMessage::new("Hello World", user).into()
}

/// Incoming GET to www.cnn.com with a JSON body
#[allow(dead_code)]
pub fn cnn_request() -> HttpRequestDescriptor {
    HttpRequestDescriptor::new("GET", "/requestpath")
        .with_host("www.cnn.com")
        .with_protocol("http")
        .with_header("User-Agent", "hubot-test")
        .with_body(json!({"foo": "bar"}))
}
