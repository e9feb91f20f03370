use connector_core::{ApiClient, ClientConfig, ConnectorError};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test(flavor = "multi_thread")]
async fn get_json_sends_bearer_header_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/datasets"))
        .and(header("authorization", "Bearer secret-key"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code":0})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let value = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new(ClientConfig::new("secret-key", uri)).expect("client");
        client.get_json("/api/v1/datasets", &[("page", "2")])
    })
    .await
    .expect("join")
    .expect("json");

    assert_eq!(value, serde_json::json!({"code":0}));
}

#[tokio::test(flavor = "multi_thread")]
async fn non_success_status_becomes_api_error_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat-messages"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_param"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new(ClientConfig::new("k", uri)).expect("client");
        client
            .post_json(
                "chat-messages",
                &serde_json::json!({"query":"hi"}),
                std::time::Duration::from_secs(5),
            )
            .map(|_| ())
    })
    .await
    .expect("join")
    .expect_err("400 should fail");

    assert_eq!(
        err,
        ConnectorError::Api {
            status: 400,
            body: "invalid_param".into()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_host_is_transport_error() {
    let server = MockServer::builder().start().await;
    let uri = server.uri();
    drop(server);

    let err = tokio::task::spawn_blocking(move || {
        let client = ApiClient::new(ClientConfig::new("k", uri)).expect("client");
        client.get_json("/api/v1/datasets", &[] as &[(&str, &str)])
    })
    .await
    .expect("join")
    .expect_err("server is gone");

    assert_eq!(err.kind(), "transport");
}

#[test]
fn endpoint_uses_configured_base_url() {
    let client = ApiClient::new(ClientConfig::new("k", "http://dify.local/v1/")).expect("client");
    assert_eq!(
        client.endpoint("/workflows/run"),
        "http://dify.local/v1/workflows/run"
    );
}

#[test]
fn client_is_shareable_across_threads() {
    fn is_send_sync<T: Send + Sync>() {}
    is_send_sync::<ApiClient>();
}
