//! MCP message types layered on the JSON-RPC 2.0 envelope.
//!
//! The envelope itself lives in [`core`]; this module adds the MCP layer:
//! the closed method sets, protocol version and capability negotiation
//! types, and the typed per-method parameter/result structs grouped the way
//! the protocol groups them (initialization, resources, prompts, tools,
//! sampling, roots, logging).
//!
//! Method names are closed enums, not free strings: an inbound frame whose
//! method falls outside the known sets is an error, decided before any
//! payload decoding happens.

pub mod core;
pub mod initialization;
pub mod logging;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod tools;

pub use self::core::{
    JsonRpcError, JsonRpcErrorResponse, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, JSONRPC_VERSION,
};
pub use initialization::{
    ClientCapabilities, Implementation, InitializeRequest, InitializeResult, PingRequest,
    PromptsCapability, ResourcesCapability, RootsCapability, SamplingCapability,
    ServerCapabilities, ToolsCapability,
};
pub use logging::{LogLevel, LoggingMessageNotification, SetLevelRequest};
pub use prompts::{GetPromptRequest, GetPromptResult, ListPromptsRequest, ListPromptsResult, Prompt};
pub use resources::{
    ListResourceTemplatesRequest, ListResourceTemplatesResult, ListResourcesRequest,
    ListResourcesResult, ReadResourceRequest, ReadResourceResult, Resource, ResourceContents,
    SubscribeRequest, UnsubscribeRequest,
};
pub use roots::{ListRootsResult, Root};
pub use sampling::{
    CompleteRequest, CompleteResult, CreateMessageParams, CreateMessageResult, SamplingContent,
    SamplingMessage,
};
pub use tools::{CallToolRequest, CallToolResult, ListToolsRequest, ListToolsResult, Tool};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// MCP protocol version string, negotiated during initialization.
///
/// The initialize response must echo the client's advertised version
/// exactly; anything else fails the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(String);

impl ProtocolVersion {
    /// The protocol version this client advertises.
    pub const CURRENT: &'static str = "2024-11-05";

    /// The version advertised by this client.
    pub fn current() -> Self {
        Self(Self::CURRENT.to_string())
    }

    /// The version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProtocolVersion {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of request methods, client- and server-origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    /// `initialize`: the handshake request, reserved id 1
    Initialize,
    /// `ping`: liveness check, legal from either peer
    Ping,
    /// `resources/list`
    ResourcesList,
    /// `resources/templates/list`
    ResourcesTemplatesList,
    /// `resources/read`
    ResourcesRead,
    /// `resources/subscribe`
    ResourcesSubscribe,
    /// `resources/unsubscribe`
    ResourcesUnsubscribe,
    /// `prompts/list`
    PromptsList,
    /// `prompts/get`
    PromptsGet,
    /// `tools/list`
    ToolsList,
    /// `tools/call`
    ToolsCall,
    /// `logging/setLevel`
    LoggingSetLevel,
    /// `completion/complete`
    CompletionComplete,
    /// `sampling/createMessage`: server-origin
    SamplingCreateMessage,
    /// `roots/list`: server-origin
    RootsList,
}

impl RequestMethod {
    /// The wire name of this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Ping => "ping",
            Self::ResourcesList => "resources/list",
            Self::ResourcesTemplatesList => "resources/templates/list",
            Self::ResourcesRead => "resources/read",
            Self::ResourcesSubscribe => "resources/subscribe",
            Self::ResourcesUnsubscribe => "resources/unsubscribe",
            Self::PromptsList => "prompts/list",
            Self::PromptsGet => "prompts/get",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::LoggingSetLevel => "logging/setLevel",
            Self::CompletionComplete => "completion/complete",
            Self::SamplingCreateMessage => "sampling/createMessage",
            Self::RootsList => "roots/list",
        }
    }

    /// Whether a client may originate this request.
    pub fn is_client_origin(&self) -> bool {
        !matches!(self, Self::SamplingCreateMessage | Self::RootsList)
    }

    /// Whether a server may originate this request.
    pub fn is_server_origin(&self) -> bool {
        matches!(
            self,
            Self::Ping | Self::SamplingCreateMessage | Self::RootsList
        )
    }
}

impl std::str::FromStr for RequestMethod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialize" => Ok(Self::Initialize),
            "ping" => Ok(Self::Ping),
            "resources/list" => Ok(Self::ResourcesList),
            "resources/templates/list" => Ok(Self::ResourcesTemplatesList),
            "resources/read" => Ok(Self::ResourcesRead),
            "resources/subscribe" => Ok(Self::ResourcesSubscribe),
            "resources/unsubscribe" => Ok(Self::ResourcesUnsubscribe),
            "prompts/list" => Ok(Self::PromptsList),
            "prompts/get" => Ok(Self::PromptsGet),
            "tools/list" => Ok(Self::ToolsList),
            "tools/call" => Ok(Self::ToolsCall),
            "logging/setLevel" => Ok(Self::LoggingSetLevel),
            "completion/complete" => Ok(Self::CompletionComplete),
            "sampling/createMessage" => Ok(Self::SamplingCreateMessage),
            "roots/list" => Ok(Self::RootsList),
            other => Err(ProtocolError::UnknownRequestMethod(other.to_string())),
        }
    }
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The closed set of notification methods, client- and server-origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationMethod {
    /// `notifications/initialized`: client-origin, completes the handshake
    Initialized,
    /// `notifications/cancelled`: either origin
    Cancelled,
    /// `notifications/progress`: either origin
    Progress,
    /// `notifications/roots/list_changed`: client-origin
    RootsListChanged,
    /// `notifications/resources/list_changed`: server-origin
    ResourcesListChanged,
    /// `notifications/resources/updated`: server-origin
    ResourcesUpdated,
    /// `notifications/prompts/list_changed`: server-origin
    PromptsListChanged,
    /// `notifications/tools/list_changed`: server-origin
    ToolsListChanged,
    /// `notifications/message`: server-origin log message
    Message,
}

impl NotificationMethod {
    /// The wire name of this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "notifications/initialized",
            Self::Cancelled => "notifications/cancelled",
            Self::Progress => "notifications/progress",
            Self::RootsListChanged => "notifications/roots/list_changed",
            Self::ResourcesListChanged => "notifications/resources/list_changed",
            Self::ResourcesUpdated => "notifications/resources/updated",
            Self::PromptsListChanged => "notifications/prompts/list_changed",
            Self::ToolsListChanged => "notifications/tools/list_changed",
            Self::Message => "notifications/message",
        }
    }

    /// Whether a client may originate this notification.
    pub fn is_client_origin(&self) -> bool {
        matches!(
            self,
            Self::Initialized | Self::Cancelled | Self::Progress | Self::RootsListChanged
        )
    }

    /// Whether a server may originate this notification.
    pub fn is_server_origin(&self) -> bool {
        !matches!(self, Self::Initialized | Self::RootsListChanged)
    }
}

impl std::str::FromStr for NotificationMethod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notifications/initialized" => Ok(Self::Initialized),
            "notifications/cancelled" => Ok(Self::Cancelled),
            "notifications/progress" => Ok(Self::Progress),
            "notifications/roots/list_changed" => Ok(Self::RootsListChanged),
            "notifications/resources/list_changed" => Ok(Self::ResourcesListChanged),
            "notifications/resources/updated" => Ok(Self::ResourcesUpdated),
            "notifications/prompts/list_changed" => Ok(Self::PromptsListChanged),
            "notifications/tools/list_changed" => Ok(Self::ToolsListChanged),
            "notifications/message" => Ok(Self::Message),
            other => Err(ProtocolError::UnknownNotificationMethod(other.to_string())),
        }
    }
}

impl std::fmt::Display for NotificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A client-originated request with a typed result.
///
/// The method string is fixed by the implementing type and drives both the
/// outbound `method` field and the decoding of the eventual `result`.
pub trait ClientRequest: Serialize {
    /// The wire method for this request type.
    const METHOD: RequestMethod;

    /// The type the response's `result` decodes into.
    type Result: DeserializeOwned + Send + 'static;
}

/// Convert a generic request into the typed parameters of `R`.
///
/// Fails with [`ProtocolError::InvalidMethodForRequest`] when the method
/// string does not match, and with [`ProtocolError::InvalidParams`] when the
/// payload does not fit the schema.
pub fn typed_params<R>(request: &JsonRpcRequest) -> Result<R, ProtocolError>
where
    R: ClientRequest + DeserializeOwned,
{
    if request.method != R::METHOD.as_str() {
        return Err(ProtocolError::InvalidMethodForRequest {
            expected: R::METHOD.as_str().to_string(),
            actual: request.method.clone(),
        });
    }
    request
        .params_as::<R>()
        .map_err(|e| ProtocolError::InvalidParams {
            method: request.method.clone(),
            detail: e.to_string(),
        })
}

/// Progress token carried in a request's `_meta` and echoed by the peer in
/// progress notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    /// String token
    String(String),
    /// Numeric token
    Number(i64),
}

impl ProgressToken {
    /// Generate a fresh string token.
    pub fn generate() -> Self {
        Self::String(uuid::Uuid::new_v4().to_string())
    }
}

impl From<&str> for ProgressToken {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for ProgressToken {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl std::fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Reserved request metadata, spelled `_meta` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Token the peer may echo in progress notifications.
    #[serde(rename = "progressToken", skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<ProgressToken>,
}

/// Params of a `notifications/cancelled` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelledNotification {
    /// Id of the request being cancelled.
    #[serde(rename = "requestId")]
    pub request_id: RequestId,

    /// Optional human-readable reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Params of a `notifications/progress` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNotification {
    /// Token from the originating request's `_meta`.
    #[serde(rename = "progressToken")]
    pub progress_token: ProgressToken,

    /// Progress so far.
    pub progress: f64,

    /// Total expected, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,

    /// Optional progress message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Params of a `notifications/resources/updated` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUpdatedNotification {
    /// URI of the resource that changed.
    pub uri: String,
}

/// Server-initiated notifications fanned out to the client's subscriber.
///
/// Internally-handled notifications (`cancelled`, `progress`) never appear
/// here; this stream carries the ones the application reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerNotification {
    /// `notifications/resources/list_changed`
    ResourcesListChanged,
    /// `notifications/resources/updated`
    ResourcesUpdated(ResourceUpdatedNotification),
    /// `notifications/prompts/list_changed`
    PromptsListChanged,
    /// `notifications/tools/list_changed`
    ToolsListChanged,
    /// `notifications/message`
    Message(LoggingMessageNotification),
}

/// Empty result payload, used for `ping` and the write-style requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResult {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn request_method_roundtrip() {
        let all = [
            RequestMethod::Initialize,
            RequestMethod::Ping,
            RequestMethod::ResourcesList,
            RequestMethod::ResourcesTemplatesList,
            RequestMethod::ResourcesRead,
            RequestMethod::ResourcesSubscribe,
            RequestMethod::ResourcesUnsubscribe,
            RequestMethod::PromptsList,
            RequestMethod::PromptsGet,
            RequestMethod::ToolsList,
            RequestMethod::ToolsCall,
            RequestMethod::LoggingSetLevel,
            RequestMethod::CompletionComplete,
            RequestMethod::SamplingCreateMessage,
            RequestMethod::RootsList,
        ];
        for method in all {
            assert_eq!(RequestMethod::from_str(method.as_str()).unwrap(), method);
        }
    }

    #[test]
    fn unknown_request_method_is_an_error() {
        let err = RequestMethod::from_str("tools/exec").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownRequestMethod(m) if m == "tools/exec"));
    }

    #[test]
    fn notification_method_origins() {
        assert!(NotificationMethod::Initialized.is_client_origin());
        assert!(!NotificationMethod::Initialized.is_server_origin());
        assert!(NotificationMethod::Cancelled.is_client_origin());
        assert!(NotificationMethod::Cancelled.is_server_origin());
        assert!(NotificationMethod::Message.is_server_origin());
        assert!(!NotificationMethod::Message.is_client_origin());
    }

    #[test]
    fn ping_is_legal_from_both_peers() {
        assert!(RequestMethod::Ping.is_client_origin());
        assert!(RequestMethod::Ping.is_server_origin());
        assert!(!RequestMethod::SamplingCreateMessage.is_client_origin());
        assert!(!RequestMethod::ToolsCall.is_server_origin());
    }

    #[test]
    fn typed_params_rejects_method_mismatch() {
        let request = JsonRpcRequest::new("1", "tools/list", serde_json::json!({}));
        assert!(typed_params::<crate::messages::tools::ListToolsRequest>(&request).is_ok());

        let request = JsonRpcRequest::new("1", "prompts/list", serde_json::json!({}));
        let err = typed_params::<crate::messages::tools::ListToolsRequest>(&request).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMethodForRequest { .. }));
    }

    #[test]
    fn progress_token_serializes_untagged() {
        let token = ProgressToken::from("tok-1");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"tok-1\"");
        let token = ProgressToken::from(9i64);
        assert_eq!(serde_json::to_string(&token).unwrap(), "9");
    }

    #[test]
    fn request_meta_wire_name() {
        let meta = RequestMeta {
            progress_token: Some(ProgressToken::from("tok-1")),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({"progressToken": "tok-1"}));
    }

    #[test]
    fn cancelled_notification_wire_shape() {
        let cancelled = CancelledNotification {
            request_id: RequestId::from("req-7"),
            reason: Some("user".to_string()),
        };
        let json = serde_json::to_value(&cancelled).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"requestId": "req-7", "reason": "user"})
        );
    }

    #[test]
    fn protocol_version_is_transparent() {
        let version = ProtocolVersion::current();
        assert_eq!(
            serde_json::to_string(&version).unwrap(),
            "\"2024-11-05\""
        );
        let parsed: ProtocolVersion = serde_json::from_str("\"2023-10-01\"").unwrap();
        assert_ne!(parsed, version);
    }
}
