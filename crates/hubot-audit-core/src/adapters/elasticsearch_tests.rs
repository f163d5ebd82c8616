//! Tests for the Elasticsearch index client.

use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_request() -> IndexRequest {
    IndexRequest {
        index: "hubothttprequest".to_string(),
        doc_type: "HttpLogEntry".to_string(),
        body: json!({"url": "www.cnn.com/requestpath", "statusCode": 200}),
    }
}

fn client_for(server: &MockServer) -> ElasticsearchIndexClient {
    let config = ElasticsearchConfig::new(&server.uri(), "DEFAULT_GROUP").unwrap();
    ElasticsearchIndexClient::new(config).unwrap()
}

// ============================================================================
// Configuration
// ============================================================================

mod config_tests {
    use super::*;

    /// Verify the endpoint path and port are replaced by the configured ones
    #[test]
    fn test_from_audit_endpoint_keeps_only_host_name() {
        let settings = AuditSettings {
            backend_port: 9243,
            group_id: "group-9".to_string(),
            ..AuditSettings::default()
        };

        let config =
            ElasticsearchConfig::from_audit_endpoint("http://estest:8080/some/path", &settings)
                .unwrap();

        assert_eq!(config.base_url.as_str(), "https://estest:9243/");
        assert_eq!(config.auth_token, "group-9");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.max_idle_connections, 1000);
    }

    /// Verify a bare host name is read as an https endpoint
    #[test]
    fn test_from_audit_endpoint_accepts_endpoint_without_scheme() {
        let settings = AuditSettings::default();

        let bare = ElasticsearchConfig::from_audit_endpoint("estest.example.com", &settings)
            .unwrap();
        let with_port =
            ElasticsearchConfig::from_audit_endpoint("estest.example.com:8080/ingest", &settings)
                .unwrap();

        assert_eq!(bare.base_url.as_str(), "https://estest.example.com/");
        assert_eq!(with_port.base_url.as_str(), "https://estest.example.com/");
    }

    #[test]
    fn test_from_audit_endpoint_rejects_endpoint_without_host() {
        let result = ElasticsearchConfig::from_audit_endpoint("http://", &AuditSettings::default());

        assert!(matches!(result, Err(IndexError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_document_url_appends_index_and_type() {
        let config = ElasticsearchConfig::new("https://estest", "g").unwrap();
        let client = ElasticsearchIndexClient::new(config).unwrap();

        let url = client
            .document_url("hubotadapterrequest", "AdapterLogEntry")
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://estest/hubotadapterrequest/AdapterLogEntry"
        );
    }

    #[test]
    fn test_invalid_auth_token_fails_initialization() {
        let config = ElasticsearchConfig::new("https://estest", "bad\ntoken").unwrap();

        let result = ElasticsearchIndexClient::new(config);

        assert!(matches!(
            result,
            Err(IndexError::ClientInitialization { .. })
        ));
    }
}

// ============================================================================
// Indexing
// ============================================================================

mod indexing_tests {
    use super::*;

    /// Verify documents are posted to the collection path with the auth header
    #[tokio::test]
    async fn test_index_posts_document() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hubothttprequest/HttpLogEntry"))
            .and(header("X-HUBOT-AUTH-TOKEN", "DEFAULT_GROUP"))
            .and(body_json(json!({"url": "www.cnn.com/requestpath", "statusCode": 200})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"_id": "doc-1", "result": "created"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).index(sample_request()).await.unwrap();

        assert_eq!(response.id.as_deref(), Some("doc-1"));
        assert_eq!(response.result.as_deref(), Some("created"));
    }

    /// Verify a non-JSON acknowledgement still counts as success
    #[tokio::test]
    async fn test_index_accepts_empty_acknowledgement() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hubothttprequest/HttpLogEntry"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let response = client_for(&server).index(sample_request()).await.unwrap();

        assert_eq!(response, IndexResponse::default());
    }

    #[tokio::test]
    async fn test_index_reports_backend_rejection() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("mapper_parsing_exception"))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .index(sample_request())
            .await
            .unwrap_err();

        match error {
            IndexError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "mapper_parsing_exception");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_index_reports_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config = ElasticsearchConfig::new(&server.uri(), "g")
            .unwrap()
            .with_request_timeout(Duration::from_millis(50));
        let client = ElasticsearchIndexClient::new(config).unwrap();

        let error = client.index(sample_request()).await.unwrap_err();

        assert!(matches!(error, IndexError::Timeout { .. }));
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_index_reports_unreachable_backend() {
        let config = ElasticsearchConfig::new("http://127.0.0.1:1", "g").unwrap();
        let client = ElasticsearchIndexClient::new(config).unwrap();

        let error = client.index(sample_request()).await.unwrap_err();

        assert!(matches!(error, IndexError::Transport { .. }));
    }
}
