//! # palaver-common
//!
//! Types shared by the palaver crates:
//! - [`Message`] and [`StoredMessage`], the conversation turn and its persisted form
//! - [`ToolDescriptor`], [`Tool`] and [`ToolCall`] for tool calling
//! - [`ChatRequest`], [`ChatResponse`] and [`Config`] for talking to a model endpoint
//!
//! ## Example
//!
//! ```
//! use palaver_common::{ChatRequest, Message, Tool, ToolChoice, ToolDescriptor};
//!
//! let descriptor = ToolDescriptor::new(
//!     "get_current_time",
//!     serde_json::json!({"type": "object", "properties": {}, "required": []}),
//! )
//! .with_description("Get the current date and time in UTC.");
//!
//! let request = ChatRequest::new(vec![Message::user("What time is it?")])
//!     .with_tools(vec![Tool::from(&descriptor)])
//!     .with_tool_choice(ToolChoice::Auto);
//!
//! assert!(request.has_tools());
//! ```

pub mod chat;
pub mod client;
pub mod tools;

pub use chat::{Message, MessageContent, MessageRole, StoredMessage};
pub use client::{ChatRequest, ChatResponse, Config, FinishReason, RetryConfig, ToolChoice, Usage};
pub use tools::{Function, FunctionCall, Parameters, Property, Tool, ToolCall, ToolDescriptor};
