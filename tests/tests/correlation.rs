//! Request/response correlation: ping round-trips, timeouts, and
//! cancellation, with the exact wire frames.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;

use mcp_client::error::{CorrelationError, McpError, TransportError};
use mcp_client::messages::RequestId;
use mcp_client::{McpClient, RequestOptions};
use mcp_client_tests::{mock_transport, run_handshake, ServerHarness};

async fn running_client() -> (Arc<McpClient>, ServerHarness) {
    let (transport, mut harness) = mock_transport();
    let client = Arc::new(
        McpClient::builder()
            .transport(Box::new(transport))
            .build()
            .unwrap(),
    );

    let connecting = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.connect().await })
    };
    run_handshake(&mut harness).await;
    connecting.await.unwrap().unwrap();
    (client, harness)
}

#[tokio::test]
async fn server_ping_round_trip() {
    let (client, mut harness) = running_client().await;

    harness.inject(json!({"jsonrpc": "2.0", "id": 42, "method": "ping"}));

    let reply = harness.next_sent().await;
    assert_eq!(reply, json!({"jsonrpc": "2.0", "id": 42, "result": {}}));
    assert!(client.state().await.is_running());
}

#[tokio::test]
async fn request_timeout_and_late_reply() {
    let (client, mut harness) = running_client().await;

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .send_request_with_options(
                    mcp_client::messages::ListToolsRequest { cursor: None },
                    RequestOptions::default()
                        .id("t-1")
                        .timeout(Duration::from_millis(50)),
                )
                .await
        })
    };

    let sent = harness.next_sent().await;
    assert_eq!(sent["id"], "t-1");
    assert_eq!(sent["method"], "tools/list");

    // the server never answers
    let err = pending.await.unwrap().unwrap_err();
    assert_matches!(
        err,
        McpError::Transport(TransportError::Timeout { op }) if op == "id: t-1 method: tools/list"
    );

    // the registry no longer tracks t-1
    assert_eq!(client.state_of(&RequestId::from("t-1")).await, None);

    // a late reply is dropped without touching the session
    harness.inject(json!({"jsonrpc": "2.0", "id": "t-1", "result": {"tools": []}}));
    harness.inject(json!({"jsonrpc": "2.0", "id": 43, "method": "ping"}));
    let reply = harness.next_sent().await;
    assert_eq!(reply["id"], 43);
    assert!(client.state().await.is_running());
}

#[tokio::test]
async fn cancellation_emits_the_cancelled_notification() {
    let (client, mut harness) = running_client().await;

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .send_request_with_options(
                    mcp_client::messages::ListToolsRequest { cursor: None },
                    RequestOptions::default().id("req-7"),
                )
                .await
        })
    };
    let _ = harness.next_sent().await;

    client
        .cancel_request(&RequestId::from("req-7"), Some("user".to_string()))
        .await
        .unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert_matches!(
        err,
        McpError::Correlation(CorrelationError::RequestCancelled(id)) if id == RequestId::from("req-7")
    );

    let notification = harness.next_sent().await;
    assert_eq!(
        notification,
        json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": {"requestId": "req-7", "reason": "user"},
        })
    );
}

#[tokio::test]
async fn server_cancellation_of_initialize_is_ignored() {
    let (client, mut harness) = running_client().await;

    harness.inject(json!({
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": {"requestId": 1, "reason": "too slow"},
    }));
    // unknown ids are equally ignored
    harness.inject(json!({
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": {"requestId": "ghost"},
    }));

    harness.inject(json!({"jsonrpc": "2.0", "id": 44, "method": "ping"}));
    let reply = harness.next_sent().await;
    assert_eq!(reply["id"], 44);
    assert!(client.state().await.is_running());
}

#[tokio::test]
async fn concurrent_requests_correlate_by_id() {
    let (client, mut harness) = running_client().await;

    let first = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.list_tools(None).await })
    };
    let second = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.list_prompts(None).await })
    };

    let sent_a = harness.next_sent().await;
    let sent_b = harness.next_sent().await;
    let ids: Vec<_> = [&sent_a, &sent_b].iter().map(|s| s["id"].clone()).collect();
    assert_ne!(ids[0], ids[1], "in-flight requests never share an id");

    // answer in reverse order
    for sent in [&sent_b, &sent_a] {
        let result = match sent["method"].as_str().unwrap() {
            "tools/list" => json!({"tools": []}),
            "prompts/list" => json!({"prompts": []}),
            other => panic!("unexpected method {other}"),
        };
        harness.inject(json!({"jsonrpc": "2.0", "id": sent["id"], "result": result}));
    }

    assert!(first.await.unwrap().unwrap().tools.is_empty());
    assert!(second.await.unwrap().unwrap().prompts.is_empty());
}

#[tokio::test]
async fn duplicate_explicit_id_is_rejected() {
    let (client, mut harness) = running_client().await;

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .send_request_with_options(
                    mcp_client::messages::PingRequest::default(),
                    RequestOptions::default().id("dup"),
                )
                .await
        })
    };
    let _ = harness.next_sent().await;

    let err = client
        .send_request_with_options(
            mcp_client::messages::PingRequest::default(),
            RequestOptions::default().id("dup"),
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        McpError::Correlation(CorrelationError::DuplicateRequestId(_))
    );

    harness.inject(json!({"jsonrpc": "2.0", "id": "dup", "result": {}}));
    pending.await.unwrap().unwrap();
}
