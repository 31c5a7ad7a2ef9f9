//! Tool discovery and execution message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ClientRequest, RequestMethod};

/// A tool the server exposes for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name, used in `tools/call`.
    pub name: String,

    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,

    /// Reserved metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// One piece of tool output content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Plain text output.
    Text {
        /// The text payload.
        text: String,
    },
    /// Base64-encoded image output.
    Image {
        /// The base64 payload.
        data: String,
        /// Image MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// An embedded resource.
    Resource {
        /// The resource contents.
        resource: Value,
    },
}

/// Params of `tools/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListToolsRequest {
    /// Pagination cursor from a previous result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl ClientRequest for ListToolsRequest {
    const METHOD: RequestMethod = RequestMethod::ToolsList;
    type Result = ListToolsResult;
}

/// Result of `tools/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Tools on this page.
    pub tools: Vec<Tool>,

    /// Cursor for the next page, when more exist.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Params of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolRequest {
    /// Name of the tool to invoke.
    pub name: String,

    /// Arguments matching the tool's input schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl ClientRequest for CallToolRequest {
    const METHOD: RequestMethod = RequestMethod::ToolsCall;
    type Result = CallToolResult;
}

/// Result of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Output content blocks.
    pub content: Vec<ToolContent>,

    /// Whether the tool itself reported an error (as opposed to a
    /// protocol-level failure).
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}
