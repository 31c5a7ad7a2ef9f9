//! Logging message types: level control and server log notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ClientRequest, EmptyResult, RequestMethod};

/// Log severity levels, mirroring syslog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Detailed debugging information
    Debug,
    /// Normal operational messages
    Info,
    /// Normal but significant events
    Notice,
    /// Warning conditions
    Warning,
    /// Error conditions
    Error,
    /// Critical conditions
    Critical,
    /// Action must be taken immediately
    Alert,
    /// System is unusable
    Emergency,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        };
        write!(f, "{name}")
    }
}

/// Params of `logging/setLevel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLevelRequest {
    /// Minimum level the server should emit.
    pub level: LogLevel,
}

impl ClientRequest for SetLevelRequest {
    const METHOD: RequestMethod = RequestMethod::LoggingSetLevel;
    type Result = EmptyResult;
}

/// Params of a server `notifications/message` log notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingMessageNotification {
    /// Severity of the message.
    pub level: LogLevel,

    /// Optional logger name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,

    /// The message payload, any JSON shape.
    pub data: Value,
}
