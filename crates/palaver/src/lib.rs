//! # palaver
//!
//! A small orchestration layer around a chat-completion model: send a
//! conversation with a set of tools, get one reply back, and keep a durable
//! record of every turn, tool results included.
//!
//! - [`invocation`]: builds one request (system prompt, tool definitions,
//!   fixed call policy) and returns the reply message.
//! - [`memory`]: the append-only conversation log, enriching messages with an
//!   id and `createdAt` on write and stripping them on read.
//! - [`config`]: TOML settings that wire both together.
//!
//! ## The calling loop
//!
//! ```no_run
//! use palaver::invocation::{Invocation, Invoker};
//! use palaver::memory::{JsonFileStore, Memory};
//! use palaver_client::OpenAIClient;
//! use palaver_common::{Config, Message, ToolDescriptor};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = OpenAIClient::new(Config::new("openai", "gpt-4o-mini").with_api_key("sk-..."))?;
//! let invoker = Invoker::new(client, "You can tell the time.");
//! let memory = Memory::new(JsonFileStore::open("memory.json").await?);
//! let tools = vec![ToolDescriptor::new("get_time", serde_json::json!({"type": "object"}))];
//!
//! memory.append_messages(vec![Message::user("What time is it?")]).await?;
//!
//! loop {
//!     let history = memory.get_all_messages().await?;
//!     let reply = invoker
//!         .invoke(Invocation::builder().messages(history).tools(tools.clone()).build())
//!         .await?;
//!     memory.append_messages(vec![reply.clone()]).await?;
//!
//!     if reply.tool_calls.is_empty() {
//!         println!("{}", reply.text().unwrap_or_default());
//!         break;
//!     }
//!     for call in &reply.tool_calls {
//!         memory.record_tool_response(&call.id, "12:00 UTC").await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod invocation;
pub mod memory;

pub use palaver_client::*;
pub use palaver_common::*;

pub use config::Settings;
pub use error::{CoreError, Result};
pub use invocation::{DEFAULT_TEMPERATURE, Invocation, Invoker};
pub use memory::{JsonFileStore, Memory, MessageStore};
