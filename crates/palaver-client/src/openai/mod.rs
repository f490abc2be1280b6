//! OpenAI chat-completions wire types and client.
//!
//! Works with any endpoint that speaks the `/chat/completions` protocol.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use typed_builder::TypedBuilder;

use palaver_common::chat::{Message, MessageContent, MessageRole};
use palaver_common::client::{ChatRequest, Config, Usage};
use palaver_common::tools::{FunctionCall, Tool, ToolCall};

pub mod client;
pub use client::OpenAIClient;

/// A single choice from a chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// The index of this choice in the response array.
    pub index: u32,
    /// The generated message for this choice.
    pub message: OpenAIMessage,
    /// Why generation stopped: "stop", "length", "tool_calls", "content_filter".
    pub finish_reason: Option<String>,
}

/// A message as the endpoint sends and receives it.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct OpenAIMessage {
    /// The role of the message author.
    pub role: MessageRole,
    /// Text or structured content; absent on tool-call-only replies.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    /// Tool calls requested by the assistant.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<SmallVec<[OpenAIToolCall; 1]>>,
    /// ID of the tool call a `tool` message answers.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl From<&Message> for OpenAIMessage {
    fn from(message: &Message) -> Self {
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(
                message
                    .tool_calls
                    .iter()
                    .map(OpenAIToolCall::from)
                    .collect(),
            )
        };

        Self::builder()
            .role(message.role)
            .content(message.content.clone())
            .tool_calls(tool_calls)
            .tool_call_id(message.tool_call_id.clone())
            .build()
    }
}

impl From<OpenAIMessage> for Message {
    fn from(message: OpenAIMessage) -> Self {
        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(ToolCall::from)
            .collect();

        Self {
            role: message.role,
            content: message.content,
            tool_calls,
            tool_call_id: message.tool_call_id,
        }
    }
}

/// A tool call as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    /// Unique identifier for this tool call.
    pub id: Cow<'static, str>,
    /// Type of the tool call, typically "function".
    #[serde(rename = "type", default = "default_tool_call_type")]
    pub r#type: Cow<'static, str>,
    /// The function to call with its arguments.
    pub function: OpenAIFunction,
}

impl From<&ToolCall> for OpenAIToolCall {
    fn from(tool_call: &ToolCall) -> Self {
        Self {
            id: Cow::Owned(tool_call.id.clone()),
            r#type: Cow::Owned(tool_call.call_type.clone()),
            function: OpenAIFunction::from(&tool_call.function),
        }
    }
}

impl From<OpenAIToolCall> for ToolCall {
    fn from(tool_call: OpenAIToolCall) -> Self {
        Self {
            id: tool_call.id.into_owned(),
            function: FunctionCall {
                name: tool_call.function.name.into_owned(),
                arguments: tool_call.function.arguments.into_owned(),
            },
            call_type: tool_call.r#type.into_owned(),
        }
    }
}

const fn default_tool_call_type() -> Cow<'static, str> {
    Cow::Borrowed("function")
}

/// Function name and JSON-encoded arguments of a wire tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunction {
    /// The name of the function to call.
    pub name: Cow<'static, str>,
    /// The arguments as a JSON-serialized string.
    #[serde(default)]
    pub arguments: Cow<'static, str>,
}

impl From<&FunctionCall> for OpenAIFunction {
    fn from(function_call: &FunctionCall) -> Self {
        Self {
            name: Cow::Owned(function_call.name.clone()),
            arguments: Cow::Owned(function_call.arguments.clone()),
        }
    }
}

/// Body of a `POST /chat/completions` request.
///
/// ```
/// use palaver_client::openai::ChatCompletionRequest;
///
/// let request = ChatCompletionRequest::builder()
///     .model("gpt-4o-mini".to_string())
///     .messages(vec![])
///     .temperature(Some(0.1))
///     .build();
///
/// assert_eq!(request.stream, Some(false));
/// ```
#[derive(Debug, Clone, Serialize, TypedBuilder)]
pub struct ChatCompletionRequest {
    /// The model identifier to use.
    pub model: String,
    /// The conversation messages in wire format.
    pub messages: Vec<OpenAIMessage>,
    /// Sampling temperature 0.0 to 2.0.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Streaming is never requested; always `false`.
    #[builder(default = Some(false))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tool definitions offered to the model.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Tool selection strategy.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Whether several tool calls may appear in one reply.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

/// Maps a provider-neutral request onto the wire format, falling back to the
/// configured model when the request names none.
impl From<(&ChatRequest, &Config)> for ChatCompletionRequest {
    fn from((request, config): (&ChatRequest, &Config)) -> Self {
        let messages: Vec<OpenAIMessage> =
            request.messages.iter().map(OpenAIMessage::from).collect();

        Self::builder()
            .model(
                request
                    .model
                    .clone()
                    .unwrap_or_else(|| config.model.clone()),
            )
            .messages(messages)
            .temperature(request.temperature)
            .tools(request.tools.clone())
            .tool_choice(request.tool_choice.clone().map(Into::into))
            .parallel_tool_calls(request.parallel_tool_calls)
            .build()
    }
}

/// Response body of a chat completion request.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique identifier for this completion.
    pub id: String,
    /// Object type, typically "chat.completion".
    #[serde(default)]
    pub object: String,
    /// Unix timestamp of when the completion was created.
    #[serde(default)]
    pub created: i64,
    /// The model that generated this completion.
    pub model: String,
    /// Generated completions; only the first is used.
    pub choices: Vec<ChatChoice>,
    /// Token usage statistics, if reported.
    #[serde(default)]
    pub usage: Option<Usage>,
}
