//! Session lifecycle: the initialize handshake and its failure modes.

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;

use mcp_client::error::{McpError, ProtocolError};
use mcp_client::{McpClient, SessionState};
use mcp_client_tests::{mock_transport, run_handshake};

#[tokio::test]
async fn handshake_success_reaches_running() {
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

    assert!(client.state().await.is_running());
    let capabilities = client.server_capabilities().await.unwrap();
    assert!(capabilities.supports_resource_subscribe());
    assert_eq!(client.server_info().await.unwrap().name, "test-server");
}

#[tokio::test]
async fn version_mismatch_fails_without_initialized_notification() {
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

    let init = harness.next_sent().await;
    assert_eq!(init["method"], "initialize");
    harness.inject(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "protocolVersion": "2023-10-01",
            "capabilities": {},
            "serverInfo": {"name": "stale-server", "version": "0.9.0"},
        },
    }));

    let err = connecting.await.unwrap().unwrap_err();
    assert_matches!(
        err,
        McpError::Protocol(ProtocolError::UnsupportedVersion { version, .. }) if version == "2023-10-01"
    );
    assert_eq!(client.state().await.name(), "failed");
    assert!(
        harness.sent_rx.try_recv().is_err(),
        "no initialized notification after a version mismatch"
    );
}

#[tokio::test]
async fn initialize_error_response_fails_the_session() {
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

    let _ = harness.next_sent().await;
    harness.inject(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {"code": -32603, "message": "server on fire"},
    }));

    let err = connecting.await.unwrap().unwrap_err();
    assert_matches!(err, McpError::Protocol(ProtocolError::ServerError { code: -32603, .. }));
    assert_eq!(client.state().await.name(), "failed");
}

#[tokio::test]
async fn disconnect_returns_to_disconnected() {
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

    client.disconnect().await.unwrap();
    assert_eq!(client.state().await, SessionState::Disconnected);

    // requests are rejected again
    let err = client.ping().await.unwrap_err();
    assert_matches!(err, McpError::Protocol(ProtocolError::NotConnected));
}

#[tokio::test]
async fn fatal_inbound_error_fails_all_pending() {
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

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.list_tools(None).await })
    };
    let _ = harness.next_sent().await;

    harness.inject_error(mcp_client::error::TransportError::OperationFailed {
        detail: "stream reset".to_string(),
    });

    let err = pending.await.unwrap().unwrap_err();
    assert_matches!(err, McpError::Transport(_));
    assert_eq!(client.state().await.name(), "failed");
}
