//! Core JSON-RPC 2.0 envelope types and the wire codec.
//!
//! Every frame on the wire is one of four shapes, classified by field
//! presence: a request (`id` + `method`), a notification (`method`, no
//! `id`), a response (`id` + `result`), or an error (`error` object with an
//! optional `id`). [`JsonRpcMessage::from_slice`] performs that
//! classification after verifying the `jsonrpc` version; anything else is a
//! hard decode error, never a silent fallthrough.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{McpResult, ProtocolError, TransportError};

/// The only JSON-RPC version this client speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// Request id for JSON-RPC messages: an integer or a string.
///
/// Equality and hashing are total; uniqueness across concurrently in-flight
/// requests is enforced by the pending-request registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier
    Number(i64),
    /// String identifier
    String(String),
}

impl RequestId {
    /// The id reserved for the `initialize` request.
    pub const INITIALIZE: RequestId = RequestId::Number(1);

    /// Generate a fresh string id.
    pub fn generate() -> Self {
        Self::String(uuid::Uuid::new_v4().to_string())
    }

    /// Whether this is the reserved `initialize` id.
    pub fn is_reserved(&self) -> bool {
        *self == Self::INITIALIZE
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Unique identifier for request/response correlation
    pub id: RequestId,

    /// Method name being invoked
    pub method: String,

    /// Parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new request with the given id, method, and parameters.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params: Some(params),
        }
    }

    /// Create a new request without parameters.
    pub fn without_params(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// Decode the parameters into a per-method schema.
    pub fn params_as<T>(&self) -> Result<T, serde_json::Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        match &self.params {
            Some(params) => serde_json::from_value(params.clone()),
            None => serde_json::from_value(Value::Object(Map::new())),
        }
    }
}

/// JSON-RPC 2.0 success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Id from the corresponding request
    pub id: RequestId,

    /// Result payload
    pub result: Value,
}

impl JsonRpcResponse {
    /// Create a success response with the given result.
    pub fn new(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result,
        }
    }

    /// Decode the result into a declared result type.
    pub fn result_as<T>(&self) -> Result<T, serde_json::Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_json::from_value(self.result.clone())
    }
}

/// JSON-RPC 2.0 error response.
///
/// The id may be null when the server could not determine which request
/// failed (e.g. a parse error on its side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Id from the corresponding request, if known
    pub id: Option<RequestId>,

    /// Error payload
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    /// Create an error response for the given request id.
    pub fn new(id: impl Into<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            error,
        }
    }
}

/// JSON-RPC 2.0 notification message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,

    /// Method name being invoked
    pub method: String,

    /// Parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification with the given method and parameters.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
        }
    }

    /// Create a new notification without parameters.
    pub fn without_params(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
        }
    }

    /// Decode the parameters into a per-method schema.
    pub fn params_as<T>(&self) -> Result<T, serde_json::Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        match &self.params {
            Some(params) => serde_json::from_value(params.clone()),
            None => serde_json::from_value(Value::Object(Map::new())),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new JSON-RPC error.
    pub fn new(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    /// "Parse error" (-32700): the JSON could not be parsed.
    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error", None)
    }

    /// "Invalid Request" (-32600): not a valid JSON-RPC request.
    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::new(-32600, "Invalid Request", Some(Value::String(details.into())))
    }

    /// "Method not found" (-32601).
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            -32601,
            "Method not found",
            Some(Value::String(format!("method '{}' not found", method.into()))),
        )
    }

    /// "Invalid params" (-32602).
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(-32602, "Invalid params", Some(Value::String(details.into())))
    }

    /// "Internal error" (-32603).
    pub fn internal_error(details: impl Into<String>) -> Self {
        Self::new(-32603, "Internal error", Some(Value::String(details.into())))
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// Any JSON-RPC message, classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Request expecting a response
    Request(JsonRpcRequest),
    /// Success response to a previous request
    Response(JsonRpcResponse),
    /// Error response to a previous request
    Error(JsonRpcErrorResponse),
    /// One-way notification
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Decode one frame of bytes into a classified message.
    pub fn from_slice(bytes: &[u8]) -> McpResult<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| TransportError::InvalidMessage {
                detail: format!("frame is not valid JSON: {e}"),
            })?;
        Self::from_value(value)
    }

    /// Classify a JSON value into a message.
    ///
    /// The `jsonrpc` field is checked first; classification then follows
    /// field presence: `error` wins over `result`, an `id` with a `method`
    /// is a request, a `method` alone is a notification.
    pub fn from_value(value: Value) -> McpResult<Self> {
        let object = match &value {
            Value::Object(map) => map,
            other => {
                return Err(TransportError::InvalidMessage {
                    detail: format!("expected a JSON object, got {other}"),
                }
                .into())
            }
        };

        match object.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            Some(other) => {
                return Err(ProtocolError::InvalidVersion {
                    found: other.to_string(),
                }
                .into())
            }
            None => {
                return Err(ProtocolError::InvalidVersion {
                    found: "<absent>".to_string(),
                }
                .into())
            }
        }

        if let Some(id) = object.get("id") {
            Self::check_id_type(id)?;
        }

        let has_id = object.contains_key("id");
        let has_method = object.contains_key("method");

        if object.contains_key("error") {
            return Ok(Self::Error(serde_json::from_value(value).map_err(|e| {
                TransportError::InvalidMessage {
                    detail: format!("malformed error response: {e}"),
                }
            })?));
        }

        match (has_id, has_method, object.contains_key("result")) {
            (true, true, _) => Ok(Self::Request(serde_json::from_value(value).map_err(
                |e| TransportError::InvalidMessage {
                    detail: format!("malformed request: {e}"),
                },
            )?)),
            (false, true, _) => Ok(Self::Notification(serde_json::from_value(value).map_err(
                |e| TransportError::InvalidMessage {
                    detail: format!("malformed notification: {e}"),
                },
            )?)),
            (true, false, true) => Ok(Self::Response(serde_json::from_value(value).map_err(
                |e| TransportError::InvalidMessage {
                    detail: format!("malformed response: {e}"),
                },
            )?)),
            _ => Err(TransportError::InvalidMessage {
                detail: "frame is neither request, response, error, nor notification".to_string(),
            }
            .into()),
        }
    }

    fn check_id_type(id: &Value) -> McpResult<()> {
        match id {
            Value::String(_) => Ok(()),
            Value::Number(n) if n.is_i64() => Ok(()),
            // error responses may carry a null id
            Value::Null => Ok(()),
            other => Err(TransportError::InvalidMessage {
                detail: format!("request id must be an integer or string, got {other}"),
            }
            .into()),
        }
    }

    /// Encode this message as one wire frame.
    pub fn to_bytes(&self) -> McpResult<Bytes> {
        let encoded = serde_json::to_vec(self)?;
        Ok(Bytes::from(encoded))
    }

    /// The method name, for requests and notifications.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(req) => Some(&req.method),
            Self::Notification(notif) => Some(&notif.method),
            Self::Response(_) | Self::Error(_) => None,
        }
    }

    /// The request id, if this message carries one.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(req) => Some(&req.id),
            Self::Response(resp) => Some(&resp.id),
            Self::Error(err) => err.id.as_ref(),
            Self::Notification(_) => None,
        }
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(req: JsonRpcRequest) -> Self {
        Self::Request(req)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(resp: JsonRpcResponse) -> Self {
        Self::Response(resp)
    }
}

impl From<JsonRpcErrorResponse> for JsonRpcMessage {
    fn from(err: JsonRpcErrorResponse) -> Self {
        Self::Error(err)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notif: JsonRpcNotification) -> Self {
        Self::Notification(notif)
    }
}
