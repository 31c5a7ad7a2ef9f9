//! Error types for MCP client operations.
//!
//! The error surface is layered the way the failure modes are layered:
//! transport faults, protocol violations, and request-correlation problems
//! each get their own enum, with [`McpError`] as the top-level type every
//! public operation returns.
//!
//! Errors on a single outbound send invalidate only that request; errors
//! decoding inbound frames or losing the transport are fatal to the session
//! and fail every outstanding request.

use serde_json::Value;
use thiserror::Error;

use crate::messages::RequestId;

/// Convenience alias for results using [`McpError`].
pub type McpResult<T> = Result<T, McpError>;

/// The main error type for all MCP client operations.
#[derive(Error, Debug)]
pub enum McpError {
    /// Transport-level errors (connection, framing, timeouts).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Protocol-level errors (envelope shape, versions, capabilities).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Request/response correlation errors.
    #[error("correlation error: {0}")]
    Correlation(#[from] CorrelationError),

    /// Configuration errors (invalid files, missing or bad parameters).
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization errors.
    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        /// The underlying serde_json error
        source: serde_json::Error,
    },

    /// IO errors from process or file operations.
    #[error("io error: {source}")]
    Io {
        #[from]
        /// The underlying IO error
        source: std::io::Error,
    },
}

/// Transport-specific errors shared by the SSE and stdio transports.
#[derive(Error, Debug, Clone)]
#[allow(missing_docs)]
pub enum TransportError {
    /// Failed to establish the underlying connection.
    #[error("connection failed: {detail}")]
    ConnectionFailed { detail: String },

    /// An operation on an established connection failed.
    #[error("operation failed: {detail}")]
    OperationFailed { detail: String },

    /// An operation exceeded its deadline.
    #[error("operation timed out: {op}")]
    Timeout { op: String },

    /// A frame could not be accepted or understood.
    #[error("invalid message: {detail}")]
    InvalidMessage { detail: String },

    /// The transport is not in a state that permits the operation.
    #[error("invalid transport state: {reason}")]
    InvalidState { reason: String },

    /// A frame exceeded the configured size limit.
    #[error("message exceeds the {limit} byte limit")]
    MessageTooLarge { limit: usize },

    /// The transport does not support the requested operation.
    #[error("not supported: {detail}")]
    NotSupported { detail: String },

    /// The transport is not connected.
    #[error("transport not connected")]
    NotConnected,
}

/// Protocol-level errors related to MCP message handling.
#[derive(Error, Debug, Clone)]
#[allow(missing_docs)]
pub enum ProtocolError {
    /// The `jsonrpc` field was missing or not `"2.0"`.
    #[error("invalid jsonrpc version: {found}")]
    InvalidVersion { found: String },

    /// The server negotiated a protocol version we do not speak.
    #[error("unsupported protocol version: {version} (expected {expected})")]
    UnsupportedVersion { version: String, expected: String },

    /// A request carried a method outside the known set.
    #[error("unknown request method: {0}")]
    UnknownRequestMethod(String),

    /// A notification carried a method outside the known set.
    #[error("unknown notification method: {0}")]
    UnknownNotificationMethod(String),

    /// A generic request was converted to a typed one with the wrong method.
    #[error("method {actual} does not match expected method {expected}")]
    InvalidMethodForRequest { expected: String, actual: String },

    /// Parameters failed to decode into the per-method schema.
    #[error("invalid params for {method}: {detail}")]
    InvalidParams { method: String, detail: String },

    /// A result failed to decode into the declared result type.
    #[error("invalid response: {detail}")]
    InvalidResponse { detail: String },

    /// The peer invoked a capability that was not negotiated.
    #[error("capability not negotiated for {method}")]
    UnsupportedCapability { method: String },

    /// The server returned a JSON-RPC error for one of our requests.
    #[error("server error {code}: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<Value>,
    },

    /// The session is not connected.
    #[error("client is not connected")]
    NotConnected,

    /// The operation is not legal in the current session state.
    #[error("operation not permitted while {state}: {reason}")]
    InvalidSessionState { state: String, reason: String },
}

/// Errors from the pending-request registry.
#[derive(Error, Debug, Clone)]
#[allow(missing_docs)]
pub enum CorrelationError {
    /// A request id is already registered for an in-flight request.
    #[error("request id {0} is already in flight")]
    DuplicateRequestId(RequestId),

    /// Id `1` is reserved for `initialize`.
    #[error("request id {0} is reserved for the initialize request")]
    ReusedRequestId(RequestId),

    /// No pending request exists for the given id.
    #[error("no pending request with id {0}")]
    UnknownRequestId(RequestId),

    /// An inbound response named an id we never registered.
    #[error("response for unknown request id {0}")]
    UnknownResponseId(RequestId),

    /// The completion channel closed without a response being delivered.
    #[error("no response received for request {0}")]
    NoResponse(RequestId),

    /// The request cannot be cancelled.
    #[error("request cannot be cancelled: {reason}")]
    CannotCancel { reason: String },

    /// The request was cancelled before a response arrived.
    #[error("request {0} was cancelled")]
    RequestCancelled(RequestId),

    /// A progress token is already bound to another request.
    #[error("progress token {0} is already registered")]
    DuplicateProgressToken(String),
}

/// Configuration-related errors.
#[derive(Error, Debug, Clone)]
#[allow(missing_docs)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration file has an invalid format.
    #[error("invalid configuration format in {path}: {reason}")]
    InvalidFormat { path: String, reason: String },

    /// Required configuration parameter is missing.
    #[error("missing required configuration parameter: {parameter}")]
    MissingParameter { parameter: String },

    /// Configuration parameter has an invalid value.
    #[error("invalid value for parameter '{parameter}': {value} - {reason}")]
    InvalidValue {
        parameter: String,
        value: String,
        reason: String,
    },
}

impl McpError {
    /// Create a timeout error for the given operation.
    pub fn timeout(op: impl Into<String>) -> Self {
        Self::Transport(TransportError::Timeout { op: op.into() })
    }

    /// Check if this error is worth retrying.
    ///
    /// Network-flavored transport failures are transient; protocol,
    /// correlation, and configuration errors are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            McpError::Transport(e) => e.is_retryable(),
            McpError::Io { .. } => true,
            McpError::Protocol(_) => false,
            McpError::Correlation(_) => false,
            McpError::Config(_) => false,
            McpError::Serialization { .. } => false,
        }
    }

    /// Get the error category, for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            McpError::Transport(_) => "transport",
            McpError::Protocol(_) => "protocol",
            McpError::Correlation(_) => "correlation",
            McpError::Config(_) => "config",
            McpError::Serialization { .. } => "serialization",
            McpError::Io { .. } => "io",
        }
    }
}

impl TransportError {
    /// Check if this transport error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::ConnectionFailed { .. } => true,
            TransportError::OperationFailed { .. } => true,
            TransportError::Timeout { .. } => true,
            TransportError::InvalidMessage { .. } => false,
            TransportError::InvalidState { .. } => false,
            TransportError::MessageTooLarge { .. } => false,
            TransportError::NotSupported { .. } => false,
            TransportError::NotConnected => false,
        }
    }
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            McpError::timeout("HTTP request")
        } else if err.is_connect() {
            McpError::Transport(TransportError::ConnectionFailed {
                detail: err.to_string(),
            })
        } else {
            McpError::Transport(TransportError::OperationFailed {
                detail: err.to_string(),
            })
        }
    }
}

impl From<url::ParseError> for McpError {
    fn from(err: url::ParseError) -> Self {
        McpError::Config(ConfigError::InvalidValue {
            parameter: "url".to_string(),
            value: err.to_string(),
            reason: "invalid URL format".to_string(),
        })
    }
}
