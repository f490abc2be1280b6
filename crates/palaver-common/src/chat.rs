//! Conversation messages and their persisted form.
//!
//! A [`Message`] is one turn of a conversation. A [`StoredMessage`] is the same
//! turn after it has been durably recorded: it carries an `id` and a
//! `createdAt` timestamp that are assigned exactly once, at write time.
//!
//! # Tool calling workflow
//!
//! ```
//! use palaver_common::chat::{Message, MessageRole};
//! use palaver_common::tools::ToolCall;
//!
//! let user = Message::user("What's the weather in Tokyo?");
//!
//! let call = ToolCall::with_id("call_1", "get_weather", r#"{"city": "Tokyo"}"#);
//! let assistant = Message::assistant_tool_calls(vec![call.clone()]);
//!
//! // The tool result echoes the call id so the model can pair them up.
//! let result = Message::tool(call.id.clone(), r#"{"temperature": 18}"#);
//!
//! assert_eq!(result.role, MessageRole::Tool);
//! assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
//! # let _ = (user, assistant);
//! ```
//!
//! # Metadata round trip
//!
//! Stripping the metadata from an enriched message gives back the original
//! message exactly:
//!
//! ```
//! use chrono::Utc;
//! use palaver_common::chat::{Message, StoredMessage};
//! use uuid::Uuid;
//!
//! let message = Message::user("hello");
//! let stored = StoredMessage::new(message.clone(), Uuid::new_v4(), Utc::now());
//! assert_eq!(stored.into_message(), message);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::tools::ToolCall;

/// Represents the role of a message sender in a conversation.
///
/// Roles serialize to the lowercase strings used on the wire:
/// `"system"`, `"user"`, `"assistant"` and `"tool"`.
///
/// ```
/// use palaver_common::chat::MessageRole;
///
/// let json = serde_json::to_string(&MessageRole::Tool).unwrap();
/// assert_eq!(json, "\"tool\"");
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions that set the model's behavior.
    System,
    /// Input from the end user.
    User,
    /// A reply from the model, possibly carrying tool-call requests.
    Assistant,
    /// The output of a tool, linked to the call that requested it.
    Tool,
}

/// The body of a message.
///
/// Plain text for most turns; a list of structured parts (for example text and
/// image parts) when the endpoint supports it. Parts are kept as opaque JSON.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    /// A plain text body.
    Text(String),
    /// Structured content parts, forwarded as-is.
    Parts(Vec<serde_json::Value>),
}

impl MessageContent {
    /// Returns the text body, if this is plain text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(_) => None,
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A single turn in a conversation.
///
/// Messages are immutable values; a conversation is an ordered sequence of
/// them, and that order is the model's only context.
///
/// # Invariants
///
/// - Only assistant messages carry `tool_calls`.
/// - Only tool messages carry a `tool_call_id`.
///
/// The constructors uphold both; the builder is available for full control.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, TypedBuilder)]
pub struct Message {
    /// The role of the message sender.
    pub role: MessageRole,

    /// The message body. Absent for assistant turns that only request tools.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,

    /// Tool calls requested by this message (assistant messages only).
    ///
    /// Uses `SmallVec` because replies carry at most one call under the
    /// invocation policy.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub tool_calls: SmallVec<[ToolCall; 1]>,

    /// The tool call this message answers (tool messages only).
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Creates a new message with the specified role and text content.
    pub fn new(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: SmallVec::new(),
            tool_call_id: None,
        }
    }

    /// Creates a new system message.
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Creates a new user message.
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates a new assistant message.
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Creates an assistant message that only requests tool calls.
    pub fn assistant_tool_calls(tool_calls: impl Into<SmallVec<[ToolCall; 1]>>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: None,
            tool_calls: tool_calls.into(),
            tool_call_id: None,
        }
    }

    /// Creates a tool result message.
    ///
    /// `content` is the tool's already-serialized output; its shape is
    /// defined by the tool and is not inspected here.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(MessageContent::Text(content.into())),
            tool_calls: SmallVec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Sets the tool calls for this message.
    ///
    /// # Errors
    ///
    /// Returns an error if this message is not an assistant message.
    pub fn with_tool_calls(
        mut self,
        tool_calls: impl Into<SmallVec<[ToolCall; 1]>>,
    ) -> anyhow::Result<Self> {
        if self.role != MessageRole::Assistant {
            anyhow::bail!(
                "Tool calls can only be added to assistant messages, found {:?}",
                self.role
            );
        }
        self.tool_calls = tool_calls.into();
        Ok(self)
    }

    /// Returns the text body, if there is one and it is plain text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(MessageContent::as_text)
    }

    /// Returns `true` if this message requests at least one tool call.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A [`Message`] as recorded in the conversation store.
///
/// Serializes flat: the message fields sit next to `id` and `createdAt`.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use palaver_common::chat::{Message, StoredMessage};
/// use uuid::Uuid;
///
/// let created = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
/// let stored = StoredMessage::new(Message::user("hi"), Uuid::nil(), created);
///
/// let json = serde_json::to_value(&stored).unwrap();
/// assert_eq!(json["role"], "user");
/// assert_eq!(json["content"], "hi");
/// assert_eq!(json["createdAt"], "2025-03-01T12:00:00.000Z");
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoredMessage {
    /// Globally unique identifier, assigned once when first persisted.
    pub id: Uuid,

    /// Creation instant, assigned once when first persisted.
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,

    /// The recorded message.
    #[serde(flatten)]
    pub message: Message,
}

impl StoredMessage {
    /// Wraps a message with its identity and creation time.
    #[must_use]
    pub const fn new(message: Message, id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            message,
        }
    }

    /// Drops the metadata, returning the original message.
    #[must_use]
    pub fn into_message(self) -> Message {
        self.message
    }
}

impl From<StoredMessage> for Message {
    fn from(stored: StoredMessage) -> Self {
        stored.into_message()
    }
}

/// Fixed-width RFC 3339 timestamps (`YYYY-MM-DDTHH:MM:SS.mmmZ`).
///
/// Fixed millisecond precision keeps lexical order equal to chronological
/// order, so stored records sort correctly as plain strings.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Formats an instant in the stored representation.
    #[must_use]
    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Serializes an instant in the stored representation.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    /// Parses any RFC 3339 timestamp into UTC.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an RFC 3339 string.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
