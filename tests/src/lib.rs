//! Shared helpers for the integration suite: an in-memory transport the
//! tests drive as the "server" side, and a minimal streaming HTTP server
//! for exercising the real SSE path.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use mcp_client::error::TransportError;
use mcp_client::transport::{InboundFrames, Transport, TransportState};
use mcp_client::McpResult;

/// In-memory transport. Frames the client writes appear on the harness's
/// `sent` channel; the harness injects server frames into the inbound
/// stream.
pub struct MockTransport {
    state: TransportState,
    inbound: Option<InboundFrames>,
    sent_tx: mpsc::UnboundedSender<Bytes>,
}

/// The test's handle on the server side of a [`MockTransport`].
pub struct ServerHarness {
    /// Inject a frame (or a transport error) into the client's inbound
    /// stream.
    pub inbound_tx: mpsc::UnboundedSender<McpResult<Bytes>>,
    /// Frames the client wrote, in order.
    pub sent_rx: mpsc::UnboundedReceiver<Bytes>,
}

impl ServerHarness {
    /// Receive the next frame the client sent, decoded as JSON.
    pub async fn next_sent(&mut self) -> serde_json::Value {
        let frame = tokio::time::timeout(Duration::from_secs(5), self.sent_rx.recv())
            .await
            .expect("client should send a frame")
            .expect("send channel open");
        serde_json::from_slice(&frame).expect("client frames are valid JSON")
    }

    /// Inject one frame, given as a JSON value.
    pub fn inject(&self, value: serde_json::Value) {
        self.inbound_tx
            .send(Ok(Bytes::from(value.to_string().into_bytes())))
            .expect("inbound channel open");
    }

    /// Inject a transport-level failure into the inbound stream.
    pub fn inject_error(&self, error: TransportError) {
        self.inbound_tx
            .send(Err(error.into()))
            .expect("inbound channel open");
    }
}

/// Create a connected mock transport / harness pair.
pub fn mock_transport() -> (MockTransport, ServerHarness) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            state: TransportState::Disconnected,
            inbound: Some(inbound_rx),
            sent_tx,
        },
        ServerHarness { inbound_tx, sent_rx },
    )
}

#[async_trait]
impl Transport for MockTransport {
    async fn start(&mut self) -> McpResult<()> {
        self.state = TransportState::Connected;
        Ok(())
    }

    async fn stop(&mut self) -> McpResult<()> {
        self.state = TransportState::Disconnected;
        self.inbound = None;
        Ok(())
    }

    fn state(&self) -> TransportState {
        self.state.clone()
    }

    fn inbound(&mut self) -> McpResult<InboundFrames> {
        self.inbound.take().ok_or_else(|| {
            TransportError::InvalidState {
                reason: "inbound already taken".to_string(),
            }
            .into()
        })
    }

    async fn send(&mut self, frame: Bytes, _timeout: Option<Duration>) -> McpResult<()> {
        self.sent_tx
            .send(frame)
            .map_err(|_| TransportError::NotConnected.into())
    }
}

/// The standard initialize result used across the suite.
pub fn init_result() -> serde_json::Value {
    serde_json::json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {
            "tools": {"listChanged": true},
            "resources": {"subscribe": true, "listChanged": true},
            "prompts": {"listChanged": true},
        },
        "serverInfo": {"name": "test-server", "version": "1.0.0"},
    })
}

/// Run the initialize handshake against the harness, asserting the exact
/// frames of the happy path.
pub async fn run_handshake(harness: &mut ServerHarness) {
    let init = harness.next_sent().await;
    assert_eq!(init["jsonrpc"], "2.0");
    assert_eq!(init["id"], 1);
    assert_eq!(init["method"], "initialize");
    assert_eq!(init["params"]["protocolVersion"], "2024-11-05");

    harness.inject(serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": init_result(),
    }));

    let initialized = harness.next_sent().await;
    assert_eq!(initialized["jsonrpc"], "2.0");
    assert_eq!(initialized["method"], "notifications/initialized");
    assert!(initialized.get("id").is_none());
}

/// Serve a single `GET` with a `text/event-stream` body over a raw TCP
/// socket, then hold the connection open so the stream never ends.
///
/// Returns the URL to connect to. wiremock cannot hold a streaming
/// response open, so the event-stream side is hand-rolled here.
pub async fn serve_event_stream(payload: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };

        // drain the request head
        let mut buf = vec![0u8; 4096];
        let mut head = Vec::new();
        loop {
            let Ok(n) = socket.read(&mut buf).await else {
                return;
            };
            if n == 0 {
                return;
            }
            head.extend_from_slice(&buf[..n]);
            if head.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: keep-alive\r\n\r\n{payload}"
        );
        if socket.write_all(response.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;

        // hold the stream open until the client goes away
        let mut drain = [0u8; 64];
        loop {
            match socket.read(&mut drain).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        }
    });

    format!("http://{addr}/sse")
}
