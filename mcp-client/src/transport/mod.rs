//! Transport layer: the byte-frame contract and its SSE and stdio
//! implementations.
//!
//! A transport moves opaque frames; each frame is exactly one JSON-RPC
//! message, never a batch. The contract is deliberately small:
//!
//! - `start()` / `stop()` are idempotent lifecycle transitions.
//! - `inbound()` hands over a single-consumer sequence of frames that ends
//!   when the transport stops, or terminates with the error that killed it.
//! - `send()` writes one frame, size-checked, with an optional deadline.
//!
//! Writes are linearized: concurrent senders never interleave frames on the
//! wire.

pub mod config;
pub mod factory;
pub mod retry;

#[cfg(feature = "sse")]
pub mod sse;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::{
    HealthCheckOptions, SseConfig, StdioConfig, TransportConfig, TransportOptions,
};
pub use factory::create_transport;
pub use retry::{Backoff, RetryPolicy};

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{McpResult, TransportError};

/// Inbound frame sequence: one `Bytes` per JSON-RPC message.
///
/// Single-consumer: `Transport::inbound` yields it exactly once. The
/// sequence is finite: it closes on `stop()`, and an unrecoverable
/// transport failure is delivered as a final `Err` item.
pub type InboundFrames = mpsc::UnboundedReceiver<McpResult<Bytes>>;

/// Sender half used by transport reader tasks.
pub(crate) type InboundSender = mpsc::UnboundedSender<McpResult<Bytes>>;

/// Connection state of a transport.
///
/// Equality ignores the error enclosed in `Failed`, so state machines can
/// compare against `TransportState::Failed` without constructing the exact
/// error.
#[derive(Debug, Clone, Default)]
pub enum TransportState {
    /// Not connected
    #[default]
    Disconnected,
    /// Connection being established
    Connecting,
    /// Connected and usable
    Connected,
    /// Orderly shutdown in progress
    Disconnecting,
    /// Dead with an unrecoverable error
    Failed(TransportError),
}

impl PartialEq for TransportState {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Eq for TransportState {}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnecting => write!(f, "disconnecting"),
            Self::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// Byte-framed transport to an MCP server.
///
/// A transport is a single-owner object: operations are serialized by the
/// owning client. Implementations must linearize writes internally so that
/// frames never interleave even when the owner forwards sends from multiple
/// producers.
#[async_trait]
pub trait Transport: Send {
    /// Establish the connection. Idempotent: starting a connected transport
    /// is a no-op; starting a failed one is an error.
    async fn start(&mut self) -> McpResult<()>;

    /// Tear the connection down. Idempotent. Completes the inbound
    /// sequence, cancels pending sends, and releases all resources.
    async fn stop(&mut self) -> McpResult<()>;

    /// The current connection state.
    fn state(&self) -> TransportState;

    /// Take the inbound frame sequence.
    ///
    /// May be called once per `start()`; a second call fails with
    /// [`TransportError::InvalidState`].
    fn inbound(&mut self) -> McpResult<InboundFrames>;

    /// Write one frame, optionally bounded by a deadline.
    ///
    /// The frame is size-checked against the configured maximum, and a
    /// payload embedding the transport's framing delimiter is rejected.
    async fn send(&mut self, frame: Bytes, timeout: Option<Duration>) -> McpResult<()>;
}

/// Reject frames over the configured size limit.
pub(crate) fn check_frame_size(frame: &[u8], limit: usize) -> McpResult<()> {
    if frame.len() > limit {
        return Err(TransportError::MessageTooLarge { limit }.into());
    }
    Ok(())
}
