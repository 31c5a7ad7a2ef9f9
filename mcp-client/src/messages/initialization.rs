//! Initialization and capability-negotiation message types.
//!
//! The handshake is the only exchange allowed to cross the initializing
//! boundary: the client sends `initialize` (reserved id 1), the server
//! answers with its capabilities, and the client completes with the
//! `notifications/initialized` notification.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ClientRequest, EmptyResult, ProtocolVersion, RequestMethod};

/// Implementation metadata for a client or server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Name of the implementation
    pub name: String,

    /// Version of the implementation
    pub version: String,
}

impl Implementation {
    /// Create implementation info.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Capabilities the client declares during initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Client can answer `roots/list` requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,

    /// Client can answer `sampling/createMessage` requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,

    /// Experimental, non-standard capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Map<String, Value>>,
}

impl ClientCapabilities {
    /// Declare roots support with list-change notifications.
    pub fn with_roots(mut self) -> Self {
        self.roots = Some(RootsCapability {
            list_changed: Some(true),
        });
        self
    }

    /// Declare sampling support.
    pub fn with_sampling(mut self) -> Self {
        self.sampling = Some(SamplingCapability::default());
        self
    }
}

/// Capabilities the server advertises in its initialize response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Server exposes prompt templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,

    /// Server exposes resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,

    /// Server exposes tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,

    /// Server emits `notifications/message` log messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<Value>,

    /// Experimental, non-standard capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Map<String, Value>>,
}

impl ServerCapabilities {
    /// Whether the server supports `resources/subscribe`.
    pub fn supports_resource_subscribe(&self) -> bool {
        self.resources
            .as_ref()
            .and_then(|r| r.subscribe)
            .unwrap_or(false)
    }
}

/// Client capability: answering `roots/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootsCapability {
    /// Client sends `notifications/roots/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Client capability: answering `sampling/createMessage`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingCapability {}

/// Server capability: prompt templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptsCapability {
    /// Server sends `notifications/prompts/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Server capability: resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesCapability {
    /// Server accepts `resources/subscribe`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,

    /// Server sends `notifications/resources/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Server capability: tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// Server sends `notifications/tools/list_changed`.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Params of the `initialize` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeRequest {
    /// Protocol version the client speaks.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: ProtocolVersion,

    /// Capabilities the client offers.
    pub capabilities: ClientCapabilities,

    /// Client implementation metadata.
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

impl ClientRequest for InitializeRequest {
    const METHOD: RequestMethod = RequestMethod::Initialize;
    type Result = InitializeResult;
}

/// Result of the `initialize` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version the session will use; must equal the client's
    /// advertised version exactly.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: ProtocolVersion,

    /// Capabilities the server offers.
    pub capabilities: ServerCapabilities,

    /// Server implementation metadata.
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,

    /// Optional usage instructions for the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Params of a `ping` request (none).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {}

impl ClientRequest for PingRequest {
    const METHOD: RequestMethod = RequestMethod::Ping;
    type Result = EmptyResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initialize_request_wire_shape() {
        let request = InitializeRequest {
            protocol_version: ProtocolVersion::current(),
            capabilities: ClientCapabilities::default().with_roots(),
            client_info: Implementation::new("mcp-client", "0.1.0"),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"roots": {"listChanged": true}},
                "clientInfo": {"name": "mcp-client", "version": "0.1.0"},
            })
        );
    }

    #[test]
    fn initialize_result_decodes() {
        let result: InitializeResult = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {"listChanged": true},
                "resources": {"subscribe": true, "listChanged": false},
            },
            "serverInfo": {"name": "test-server", "version": "1.0.0"},
        }))
        .unwrap();

        assert_eq!(result.protocol_version, ProtocolVersion::current());
        assert!(result.capabilities.supports_resource_subscribe());
        assert_eq!(result.server_info.name, "test-server");
        assert_eq!(result.instructions, None);
    }

    #[test]
    fn absent_capabilities_are_not_serialized() {
        let capabilities = ClientCapabilities::default();
        let json = serde_json::to_value(&capabilities).unwrap();
        assert_eq!(json, json!({}));
    }
}
