//! Provider-neutral chat-completion request, response and client configuration.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::chat::Message;
use crate::tools::Tool;

/// Controls how the model selects which tool to call, if any.
///
/// Only `auto` is modelled: requests never force or forbid a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ToolChoice {
    /// Let the model decide whether to call a tool and which one.
    #[serde(rename = "auto")]
    Auto,
}

impl From<ToolChoice> for serde_json::Value {
    fn from(tool_choice: ToolChoice) -> Self {
        match tool_choice {
            ToolChoice::Auto => Self::String("auto".to_string()),
        }
    }
}

/// Indicates why the model stopped generating tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Copy)]
#[non_exhaustive]
pub enum FinishReason {
    /// Generation completed naturally.
    #[serde(rename = "stop")]
    Stop,
    /// Generation was truncated at the token limit.
    #[serde(rename = "length")]
    Length,
    /// Generation stopped because the model requested tool calls.
    #[serde(rename = "tool_calls")]
    ToolCalls,
    /// Generation was stopped by the content filter.
    #[serde(rename = "content_filter")]
    ContentFilter,
}

impl FromStr for FinishReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(Self::Stop),
            "length" => Ok(Self::Length),
            "tool_calls" => Ok(Self::ToolCalls),
            "content_filter" => Ok(Self::ContentFilter),
            _ => anyhow::bail!("Unknown finish reason: {s}"),
        }
    }
}

/// Retry behavior for transient endpoint failures.
///
/// The default performs no retries: a failed request fails the call, and
/// retry policy belongs to the caller. Set `max_retries` to opt in to
/// exponential backoff at the HTTP layer.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts before failing.
    pub max_retries: u32,
    /// Initial delay before the first retry attempt.
    pub initial_delay: Duration,
    /// Maximum delay between retry attempts.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Token usage statistics for a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the input prompt.
    pub prompt_tokens: u32,
    /// Number of tokens generated in the completion.
    pub completion_tokens: u32,
    /// Total tokens used (prompt + completion).
    pub total_tokens: u32,
}

/// A request for a chat completion.
///
/// ```
/// use palaver_common::{ChatRequest, Message, ToolChoice};
///
/// let request = ChatRequest::new(vec![Message::user("Hello!")])
///     .with_model("gpt-4o-mini")
///     .with_temperature(0.1)
///     .with_tool_choice(ToolChoice::Auto)
///     .with_parallel_tool_calls(false);
///
/// assert_eq!(request.parallel_tool_calls, Some(false));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The conversation messages to send to the model, in order.
    pub messages: Vec<Message>,
    /// The model identifier; the client's configured model when `None`.
    pub model: Option<String>,
    /// Sampling temperature (0.0 to 2.0).
    pub temperature: Option<f32>,
    /// Tools available for the model to call.
    pub tools: Option<Vec<Tool>>,
    /// Strategy for tool selection.
    pub tool_choice: Option<ToolChoice>,
    /// Whether the model may request several tool calls in one reply.
    pub parallel_tool_calls: Option<bool>,
}

impl ChatRequest {
    /// Creates a new chat request with the given messages.
    ///
    /// All optional parameters start unset.
    pub fn new(messages: impl Into<Vec<Message>>) -> Self {
        Self {
            messages: messages.into(),
            model: None,
            temperature: None,
            tools: None,
            tool_choice: None,
            parallel_tool_calls: None,
        }
    }

    /// Sets the model to use for this request.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the tools available for the model to call.
    ///
    /// An empty list clears the tools, so no tool definitions are sent.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = if tools.is_empty() { None } else { Some(tools) };
        self
    }

    /// Sets the tool selection strategy.
    #[must_use]
    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    /// Allows or forbids several tool calls in a single reply.
    #[must_use]
    pub const fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.parallel_tool_calls = Some(parallel);
        self
    }

    /// Validate that this request has at least one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the messages vector is empty.
    pub fn validate_has_messages(&self) -> anyhow::Result<()> {
        if self.messages.is_empty() {
            anyhow::bail!("Chat request must have at least one message");
        }
        Ok(())
    }

    /// Returns whether this request has tools configured.
    #[must_use]
    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// A response from a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The reply message from the first (and only) choice.
    pub message: Message,
    /// The identifier of the model that generated this response.
    pub model: String,
    /// Token usage statistics for this request.
    pub usage: Option<Usage>,
    /// Reason why generation stopped.
    pub finish_reason: Option<FinishReason>,
    /// Timestamp when this response was created.
    pub created_at: DateTime<Utc>,
    /// Unique identifier for this response from the provider.
    pub response_id: Option<String>,
}

/// Configuration for an LLM client.
///
/// Holds connection details and the default model. The API key is a
/// `SecretString` so it never shows up in `Debug` output or logs.
///
/// ```
/// use palaver_common::Config;
///
/// let config = Config::new("openai", "gpt-4o-mini")
///     .with_api_key("sk-...")
///     .with_timeout(30);
///
/// assert_eq!(config.model, "gpt-4o-mini");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider name, informational (e.g. "openai", "ollama").
    pub provider: String,
    /// Default model identifier.
    pub model: String,
    /// Base URL of the API; the provider's public endpoint when `None`.
    pub base_url: Option<String>,
    /// API key for authentication.
    #[serde(skip)]
    pub api_key: Option<SecretString>,
    /// Request timeout in seconds; no timeout when `None`.
    pub timeout_seconds: Option<u64>,
    /// HTTP-level retry policy.
    #[serde(skip)]
    pub retry_config: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            timeout_seconds: None,
            retry_config: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Creates a configuration for a provider and default model.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into().into()));
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }
}
