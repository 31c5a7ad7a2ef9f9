//! The SSE transport against real HTTP: endpoint discovery from the event
//! stream, then a POST with the exact JSON body.

use std::time::Duration;

use bytes::Bytes;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcp_client::error::{McpError, TransportError};
use mcp_client::transport::{
    SseConfig, Transport, TransportOptions, TransportState,
};
use mcp_client::transport::sse::SseTransport;
use mcp_client_tests::serve_event_stream;

fn options() -> TransportOptions {
    TransportOptions::default().send_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn endpoint_discovery_then_post() {
    let post_server = MockServer::start().await;
    let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

    Mock::given(method("POST"))
        .and(path("/rpc/xyz"))
        .and(header("content-type", "application/json"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&post_server)
        .await;

    let endpoint = format!("{}/rpc/xyz", post_server.uri());
    let stream_url = serve_event_stream(format!(
        "event: endpoint\ndata: {endpoint}\n\n"
    ))
    .await;

    let config = SseConfig {
        url: stream_url.parse().unwrap(),
        headers: Default::default(),
    };
    let mut transport = SseTransport::new(config, options()).unwrap();
    transport.start().await.unwrap();
    assert_eq!(transport.state(), TransportState::Connected);

    transport
        .send(Bytes::from(body.to_string().into_bytes()), None)
        .await
        .unwrap();

    transport.stop().await.unwrap();
    assert_eq!(transport.state(), TransportState::Disconnected);
}

#[tokio::test]
async fn event_data_flows_to_the_inbound_stream() {
    let stream_url = serve_event_stream(concat!(
        "event: endpoint\n",
        "data: /rpc/abc\n",
        "\n",
        ": keepalive\n",
        "data: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{}}\n",
        "\n",
    )
    .to_string())
    .await;

    let config = SseConfig {
        url: stream_url.parse().unwrap(),
        headers: Default::default(),
    };
    let mut transport = SseTransport::new(config, options()).unwrap();
    transport.start().await.unwrap();
    let mut inbound = transport.inbound().unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), inbound.recv())
        .await
        .expect("frame arrives")
        .expect("stream open")
        .expect("no transport error");
    assert_eq!(&frame[..], br#"{"jsonrpc":"2.0","id":7,"result":{}}"#);

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn send_before_discovery_times_out() {
    // a stream that never announces an endpoint
    let stream_url = serve_event_stream(": hold\n".to_string()).await;

    let config = SseConfig {
        url: stream_url.parse().unwrap(),
        headers: Default::default(),
    };
    let mut transport = SseTransport::new(
        config,
        TransportOptions::default().send_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    transport.start().await.unwrap();

    let err = transport
        .send(Bytes::from_static(b"{}"), None)
        .await
        .unwrap_err();
    match err {
        McpError::Transport(TransportError::Timeout { op }) => {
            assert_eq!(op, "endpoint discovery")
        }
        other => panic!("expected endpoint discovery timeout, got {other:?}"),
    }

    transport.stop().await.unwrap();
}

#[tokio::test]
async fn non_200_get_fails_to_connect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = SseConfig {
        url: format!("{}/sse", server.uri()).parse().unwrap(),
        headers: Default::default(),
    };
    let mut transport = SseTransport::new(config, options()).unwrap();
    let err = transport.start().await.unwrap_err();
    assert!(matches!(
        err,
        McpError::Transport(TransportError::OperationFailed { .. })
    ));
    assert_eq!(
        transport.state(),
        TransportState::Failed(TransportError::NotConnected)
    );
}

#[tokio::test]
async fn failed_post_is_retried() {
    let post_server = MockServer::start().await;
    // first attempt 500, then 202
    Mock::given(method("POST"))
        .and(path("/rpc/r"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&post_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc/r"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&post_server)
        .await;

    let endpoint = format!("{}/rpc/r", post_server.uri());
    let stream_url =
        serve_event_stream(format!("event: endpoint\ndata: {endpoint}\n\n")).await;

    let mut options = options();
    options.retry_policy.base_delay = Duration::from_millis(10);
    options.retry_policy.jitter = 0.0;

    let config = SseConfig {
        url: stream_url.parse().unwrap(),
        headers: Default::default(),
    };
    let mut transport = SseTransport::new(config, options).unwrap();
    transport.start().await.unwrap();

    transport
        .send(Bytes::from_static(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\",\"id\":1}"), None)
        .await
        .unwrap();

    transport.stop().await.unwrap();
}
