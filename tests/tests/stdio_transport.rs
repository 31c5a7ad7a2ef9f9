//! Full-stack run over the real stdio transport: spawn a scripted
//! shell server and drive the handshake and a request through it.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use mcp_client::transport::{StdioConfig, TransportConfig, TransportOptions};
use mcp_client::{McpClient, RequestOptions};

/// A server written in shell: answers `initialize`, swallows the
/// `initialized` notification, then answers one `tools/list`.
const SCRIPT: &str = r#"
read -r _init
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{"listChanged":true}},"serverInfo":{"name":"script-server","version":"0.0.1"}}}'
read -r _initialized
read -r _list
printf '%s\n' '{"jsonrpc":"2.0","id":"t-9","result":{"tools":[{"name":"echo","inputSchema":{"type":"object"}}]}}'
echo 'script server done' >&2
read -r _eof
"#;

#[tokio::test]
async fn handshake_and_request_over_stdio() {
    let config = StdioConfig {
        command: "sh".into(),
        args: vec!["-c".into(), SCRIPT.into()],
        working_dir: None,
        env: Default::default(),
    };

    let client = Arc::new(
        McpClient::builder()
            .transport_config(TransportConfig::Stdio(config))
            .options(TransportOptions::default().send_timeout(Duration::from_secs(5)))
            .build()
            .unwrap(),
    );

    client.connect().await.unwrap();
    assert!(client.state().await.is_running());
    assert_eq!(client.server_info().await.unwrap().name, "script-server");

    let tools = client
        .send_request_with_options(
            mcp_client::messages::ListToolsRequest { cursor: None },
            RequestOptions::default().id("t-9"),
        )
        .await
        .unwrap();
    assert_eq!(tools.tools.len(), 1);
    assert_eq!(tools.tools[0].name, "echo");

    client.disconnect().await.unwrap();
    assert_eq!(client.state().await.name(), "disconnected");
}

#[tokio::test]
async fn server_crash_fails_the_session() {
    let config = StdioConfig {
        command: "sh".into(),
        args: vec![
            "-c".into(),
            // answer initialize, then die with a non-zero status
            r#"read -r _init
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"flaky","version":"0"}}}'
read -r _initialized
exit 9"#
                .into(),
        ],
        working_dir: None,
        env: Default::default(),
    };

    let client = Arc::new(
        McpClient::builder()
            .transport_config(TransportConfig::Stdio(config))
            .options(TransportOptions::default().send_timeout(Duration::from_secs(5)))
            .build()
            .unwrap(),
    );

    client.connect().await.unwrap();

    // the child exits; the dispatcher sees the exit error and fails the
    // session
    for _ in 0..100 {
        if client.state().await.name() == "failed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(client.state().await.name(), "failed");

    let err = client.ping().await.unwrap_err();
    assert!(matches!(
        err,
        mcp_client::McpError::Protocol(mcp_client::ProtocolError::NotConnected)
    ));
}
