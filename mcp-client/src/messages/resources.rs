//! Resource listing, reading, and subscription message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ClientRequest, EmptyResult, RequestMethod};

/// A resource the server exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// URI identifying the resource.
    pub uri: String,

    /// Human-readable name.
    pub name: String,

    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type, when known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Reserved metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// A parameterized resource URI template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    /// RFC 6570 URI template.
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,

    /// Human-readable name.
    pub name: String,

    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of resources produced by this template.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Contents of a read resource: text or binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    /// UTF-8 text contents.
    Text {
        /// URI of the resource.
        uri: String,
        /// MIME type, when known.
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        /// The text payload.
        text: String,
    },
    /// Base64-encoded binary contents.
    Blob {
        /// URI of the resource.
        uri: String,
        /// MIME type, when known.
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        /// The base64 payload.
        blob: String,
    },
}

/// Params of `resources/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResourcesRequest {
    /// Pagination cursor from a previous result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl ClientRequest for ListResourcesRequest {
    const METHOD: RequestMethod = RequestMethod::ResourcesList;
    type Result = ListResourcesResult;
}

/// Result of `resources/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// Resources on this page.
    pub resources: Vec<Resource>,

    /// Cursor for the next page, when more exist.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Params of `resources/templates/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResourceTemplatesRequest {
    /// Pagination cursor from a previous result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl ClientRequest for ListResourceTemplatesRequest {
    const METHOD: RequestMethod = RequestMethod::ResourcesTemplatesList;
    type Result = ListResourceTemplatesResult;
}

/// Result of `resources/templates/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResourceTemplatesResult {
    /// Templates on this page.
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<ResourceTemplate>,

    /// Cursor for the next page, when more exist.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Params of `resources/read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResourceRequest {
    /// URI of the resource to read.
    pub uri: String,
}

impl ClientRequest for ReadResourceRequest {
    const METHOD: RequestMethod = RequestMethod::ResourcesRead;
    type Result = ReadResourceResult;
}

/// Result of `resources/read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// One entry per resource the URI resolved to.
    pub contents: Vec<ResourceContents>,
}

/// Params of `resources/subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// URI to watch for updates.
    pub uri: String,
}

impl ClientRequest for SubscribeRequest {
    const METHOD: RequestMethod = RequestMethod::ResourcesSubscribe;
    type Result = EmptyResult;
}

/// Params of `resources/unsubscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    /// URI to stop watching.
    pub uri: String,
}

impl ClientRequest for UnsubscribeRequest {
    const METHOD: RequestMethod = RequestMethod::ResourcesUnsubscribe;
    type Result = EmptyResult;
}
