//! One model call: request construction and reply extraction.
//!
//! [`Invoker`] injects the system prompt, translates tool descriptors to
//! endpoint tool definitions, and always sends the same call policy:
//! automatic tool choice, no parallel tool calls. It returns the reply
//! message as-is; acting on tool calls is the caller's job.
//!
//! ```no_run
//! use palaver::invocation::{Invocation, Invoker};
//! use palaver_client::OpenAIClient;
//! use palaver_common::{Config, Message, ToolDescriptor};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = OpenAIClient::new(Config::new("openai", "gpt-4o-mini").with_api_key("sk-..."))?;
//! let invoker = Invoker::new(client, "You are a helpful assistant.");
//!
//! let time_tool = ToolDescriptor::new("get_current_time", serde_json::json!({"type": "object"}));
//! let reply = invoker
//!     .invoke(
//!         Invocation::builder()
//!             .messages(vec![Message::user("What time is it?")])
//!             .tools(vec![time_tool])
//!             .build(),
//!     )
//!     .await?;
//!
//! for call in &reply.tool_calls {
//!     println!("model wants {}({})", call.function.name, call.function.arguments);
//! }
//! # Ok(())
//! # }
//! ```

use log::{debug, warn};
use typed_builder::TypedBuilder;

use palaver_client::LLMClient;
use palaver_common::{ChatRequest, Message, Tool, ToolChoice, ToolDescriptor};

use crate::error::{CoreError, Result};

/// Sampling temperature used when neither the invocation nor the invoker sets one.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Inputs for a single model call.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Invocation {
    /// Prior turns, oldest first, without the system prompt.
    pub messages: Vec<Message>,

    /// Model override for this call.
    #[builder(default, setter(strip_option, into))]
    pub model: Option<String>,

    /// Temperature override for this call.
    #[builder(default, setter(strip_option))]
    pub temperature: Option<f32>,

    /// Tools the model may request. May be empty.
    #[builder(default)]
    pub tools: Vec<ToolDescriptor>,
}

/// Sends conversations to a model endpoint.
#[derive(Debug)]
pub struct Invoker<C: LLMClient> {
    client: C,
    system_prompt: String,
    preferred_model: Option<String>,
    temperature: f32,
}

impl<C: LLMClient> Invoker<C> {
    /// Creates an invoker that prepends `system_prompt` to every call.
    pub fn new(client: C, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
            preferred_model: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Model to use when an invocation names none. Without one, the client's
    /// configured model is used.
    #[must_use]
    pub fn with_preferred_model(mut self, model: impl Into<String>) -> Self {
        self.preferred_model = Some(model.into());
        self
    }

    /// Default temperature for invocations that do not set one.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The endpoint client this invoker sends through.
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// The system prompt prepended to every request.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Builds the outgoing request without sending it.
    pub fn build_request(&self, invocation: &Invocation) -> ChatRequest {
        let mut messages = Vec::with_capacity(invocation.messages.len() + 1);
        messages.push(Message::system(self.system_prompt.as_str()));
        messages.extend(invocation.messages.iter().cloned());

        let model = invocation
            .model
            .clone()
            .or_else(|| self.preferred_model.clone())
            .unwrap_or_else(|| self.client.config().model.clone());

        let tools: Vec<Tool> = invocation.tools.iter().map(Tool::from).collect();

        ChatRequest::new(messages)
            .with_model(model)
            .with_temperature(invocation.temperature.unwrap_or(self.temperature))
            .with_tools(tools)
            .with_tool_choice(ToolChoice::Auto)
            .with_parallel_tool_calls(false)
    }

    /// Sends the conversation and returns the model's reply.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Endpoint`] if the endpoint rejects or fails the
    /// request. Nothing is retried here.
    pub async fn invoke(&self, invocation: Invocation) -> Result<Message> {
        let request = self.build_request(&invocation);
        debug!(
            "Invoking model {} with {} messages and {} tools",
            request.model.as_deref().unwrap_or_default(),
            request.messages.len(),
            invocation.tools.len()
        );

        let response = self.client.chat(&request).await.map_err(|e| {
            warn!("Model invocation failed: {e}");
            CoreError::Endpoint(e)
        })?;

        if response.message.tool_calls.len() > 1 {
            warn!(
                "Endpoint returned {} tool calls despite parallel tool calls being disabled",
                response.message.tool_calls.len()
            );
        }

        Ok(response.message)
    }
}
