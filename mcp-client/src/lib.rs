//! # MCP Client Core
//!
//! `mcp-client` is the client side of the Model Context Protocol: a
//! bidirectional JSON-RPC 2.0 peer speaking to an MCP server over a
//! pluggable byte-framed transport.
//!
//! The crate is built around three subsystems:
//!
//! - **Session state machine** ([`session`]): connect → initialize → run →
//!   shutdown, with capability negotiation and strict send gates around the
//!   initialize exchange.
//! - **Request correlation** ([`correlation`]): every outbound request owns
//!   a one-shot completion channel, a timeout timer, and a cancellation
//!   pathway cooperating with the server's `notifications/cancelled`.
//! - **Transports** ([`transport`]): an SSE client (long-lived GET event
//!   stream plus POSTs, with in-band endpoint discovery and retry) and a
//!   stdio client (newline-framed child process).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use mcp_client::client::McpClient;
//! use mcp_client::transport::TransportConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = McpClient::builder()
//!         .transport_config(TransportConfig::stdio("python", &["server.py"]))
//!         .build()?;
//!
//!     client.connect().await?;
//!     let tools = client.list_tools(None).await?;
//!     println!("server exposes {} tools", tools.tools.len());
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod correlation;
pub mod error;
pub mod messages;
pub mod session;
pub mod transport;

pub use client::{
    McpClient, McpClientBuilder, ProgressCallback, RequestOptions, RootsHandler, SamplingHandler,
};
pub use correlation::{PendingRequests, RequestState};
pub use error::{CorrelationError, McpError, McpResult, ProtocolError, TransportError};
pub use messages::{
    ClientCapabilities, Implementation, JsonRpcMessage, ProtocolVersion, RequestId,
    ServerCapabilities, ServerNotification,
};
pub use session::SessionState;
pub use transport::{Transport, TransportConfig, TransportOptions, TransportState};

/// Current version of the mcp-client library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
