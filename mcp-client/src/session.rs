//! Session state machine: connect → initialize → run → shutdown.
//!
//! Transitions are explicit and monotonic; everything not in the table is
//! rejected. `Failed` is terminal for the instance. The one rule with
//! teeth: only the `initialize` request and the `initialized` notification
//! may cross the initializing boundary.

use crate::error::{McpResult, ProtocolError};
use crate::messages::{NotificationMethod, RequestMethod, ServerCapabilities};

/// Lifecycle state of an MCP session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No transport connection
    Disconnected,
    /// Transport connection being established
    Connecting,
    /// Transport up; initialize exchange in flight
    Initializing,
    /// Handshake complete; normal operation
    Running {
        /// Capabilities the server advertised during initialization.
        server_capabilities: ServerCapabilities,
    },
    /// Terminal failure
    Failed {
        /// Description of what killed the session.
        error: String,
    },
}

impl SessionState {
    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Initializing => "initializing",
            Self::Running { .. } => "running",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether the session completed its handshake.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// The server's capabilities, available once running.
    pub fn server_capabilities(&self) -> Option<&ServerCapabilities> {
        match self {
            Self::Running {
                server_capabilities,
            } => Some(server_capabilities),
            _ => None,
        }
    }

    /// Gate for outbound requests.
    ///
    /// During `Initializing` only `initialize` itself may be sent; during
    /// `Running` any client-origin request is permitted. Everything else is
    /// not connected enough to talk.
    pub fn check_request(&self, method: RequestMethod) -> McpResult<()> {
        match self {
            Self::Running { .. } if method == RequestMethod::Initialize => {
                Err(ProtocolError::InvalidSessionState {
                    state: self.name().to_string(),
                    reason: "initialize is only legal while initializing".to_string(),
                }
                .into())
            }
            Self::Running { .. } => Ok(()),
            Self::Initializing if method == RequestMethod::Initialize => Ok(()),
            Self::Initializing => Err(ProtocolError::InvalidSessionState {
                state: self.name().to_string(),
                reason: format!("only initialize may be sent, not {method}"),
            }
            .into()),
            Self::Disconnected | Self::Connecting | Self::Failed { .. } => {
                Err(ProtocolError::NotConnected.into())
            }
        }
    }

    /// Gate for outbound notifications.
    ///
    /// During `Initializing` only `notifications/initialized` may be sent.
    pub fn check_notification(&self, method: NotificationMethod) -> McpResult<()> {
        match self {
            Self::Running { .. } => Ok(()),
            Self::Initializing if method == NotificationMethod::Initialized => Ok(()),
            Self::Initializing => Err(ProtocolError::InvalidSessionState {
                state: self.name().to_string(),
                reason: format!("only the initialized notification may be sent, not {method}"),
            }
            .into()),
            Self::Disconnected | Self::Connecting | Self::Failed { .. } => {
                Err(ProtocolError::NotConnected.into())
            }
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed { error } => write!(f, "failed: {error}"),
            other => write!(f, "{}", other.name()),
        }
    }
}
