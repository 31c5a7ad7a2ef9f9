//! Sampling and completion message types.
//!
//! `sampling/createMessage` is server-origin: the server asks the client to
//! run an LLM completion on its behalf. The client only honors it when the
//! sampling capability was advertised and a handler was supplied.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ClientRequest, RequestMethod};

/// A message in a sampling conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingMessage {
    /// `user` or `assistant`.
    pub role: String,

    /// Message content.
    pub content: SamplingContent,
}

/// Content of a sampling message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SamplingContent {
    /// Plain text content.
    Text {
        /// The text payload.
        text: String,
    },
    /// Base64-encoded image content.
    Image {
        /// The base64 payload.
        data: String,
        /// Image MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// Model selection hints for a sampling request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPreferences {
    /// Ordered model-name hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<ModelHint>>,

    /// Relative priority of cost, 0 to 1.
    #[serde(rename = "costPriority", skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,

    /// Relative priority of speed, 0 to 1.
    #[serde(rename = "speedPriority", skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,

    /// Relative priority of intelligence, 0 to 1.
    #[serde(
        rename = "intelligencePriority",
        skip_serializing_if = "Option::is_none"
    )]
    pub intelligence_priority: Option<f64>,
}

/// A single model-name hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHint {
    /// Suggested model name or family.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Params of a server-origin `sampling/createMessage` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMessageParams {
    /// Conversation so far.
    pub messages: Vec<SamplingMessage>,

    /// Model selection hints.
    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,

    /// Optional system prompt.
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Maximum tokens to sample.
    #[serde(rename = "maxTokens")]
    pub max_tokens: i64,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Stop sequences.
    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// Reserved metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Result the client's sampling handler produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMessageResult {
    /// `assistant`, by construction.
    pub role: String,

    /// The sampled content.
    pub content: SamplingContent,

    /// Name of the model that produced the completion.
    pub model: String,

    /// Why sampling stopped, when known.
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// Params of `completion/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteRequest {
    /// What is being completed: a prompt argument or a resource URI.
    #[serde(rename = "ref")]
    pub reference: Value,

    /// The argument under completion.
    pub argument: CompletionArgument,
}

impl ClientRequest for CompleteRequest {
    const METHOD: RequestMethod = RequestMethod::CompletionComplete;
    type Result = CompleteResult;
}

/// The argument being completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionArgument {
    /// Argument name.
    pub name: String,

    /// Partial value typed so far.
    pub value: String,
}

/// Result of `completion/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteResult {
    /// The completion values.
    pub completion: Completion,
}

/// Completion values for an argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Candidate values, best first.
    pub values: Vec<String>,

    /// Total candidates available, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,

    /// Whether more candidates exist beyond `values`.
    #[serde(rename = "hasMore", skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}
