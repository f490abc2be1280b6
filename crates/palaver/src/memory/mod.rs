//! Durable conversation history.
//!
//! [`Memory`] is the single source of truth for the conversation. Messages are
//! enriched with an id and a creation timestamp when first persisted and
//! stripped of both when read back, so callers only ever handle plain
//! [`Message`]s.
//!
//! Every write is one transaction: load the whole document, append, save the
//! whole document. Transactions on the same `Memory` are serialized by an
//! async lock; separate processes sharing a file are not coordinated.
//!
//! ```no_run
//! use palaver::memory::{JsonFileStore, Memory};
//! use palaver_common::Message;
//!
//! # async fn example() -> palaver::Result<()> {
//! let store = JsonFileStore::open("memory.json").await?;
//! let memory = Memory::new(store);
//!
//! memory.append_messages(vec![Message::user("What time is it?")]).await?;
//! memory.record_tool_response("call_42", r#"{"time":"12:00"}"#).await?;
//!
//! let history = memory.get_all_messages().await?;
//! assert_eq!(history.len(), 2);
//! # Ok(())
//! # }
//! ```

mod identity;
mod store;

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Mutex;

use palaver_common::{Message, MessageRole, StoredMessage};

pub use identity::{Clock, IdentityGenerator, SystemClock, UuidGenerator};
pub use store::{InMemoryStore, JsonFileStore, MessageStore, StoreDocument, StoreError};

use crate::error::{CoreError, Result};

/// The conversation log, backed by a [`MessageStore`].
pub struct Memory<S: MessageStore> {
    store: S,
    ids: Arc<dyn IdentityGenerator>,
    clock: Arc<dyn Clock>,
    validate_tool_calls: bool,
    write_lock: Mutex<()>,
}

impl<S: MessageStore> std::fmt::Debug for Memory<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("validate_tool_calls", &self.validate_tool_calls)
            .finish_non_exhaustive()
    }
}

impl<S: MessageStore> Memory<S> {
    /// Creates a memory over `store` with random UUIDs and the system clock.
    pub fn new(store: S) -> Self {
        Self {
            store,
            ids: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock::new()),
            validate_tool_calls: false,
            write_lock: Mutex::new(()),
        }
    }

    /// Replaces the identifier source.
    #[must_use]
    pub fn with_identity_generator(mut self, ids: impl IdentityGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Replaces the timestamp source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Rejects tool responses whose id the latest assistant turn never requested.
    ///
    /// Off by default, in which case a mismatched id is logged and recorded anyway.
    #[must_use]
    pub const fn with_tool_call_validation(mut self, enabled: bool) -> Self {
        self.validate_tool_calls = enabled;
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Attaches a fresh id and the current time to a copy of `message`.
    pub fn enrich_with_metadata(&self, message: &Message) -> StoredMessage {
        StoredMessage::new(message.clone(), self.ids.next_id(), self.clock.now())
    }

    /// Drops the id and timestamp, returning the original message.
    #[must_use]
    pub fn strip_metadata(stored: StoredMessage) -> Message {
        stored.into_message()
    }

    /// Appends `messages` in order and persists them before returning.
    ///
    /// Each message gets its own id and timestamp. An empty list writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Persistence`] if the store cannot be read or
    /// written; the stored history is then unchanged.
    pub async fn append_messages(&self, messages: Vec<Message>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let document = self.store.load().await?;
        self.commit(document, messages).await
    }

    /// Full history, oldest first, without metadata.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Persistence`] if the store cannot be read.
    pub async fn get_all_messages(&self) -> Result<Vec<Message>> {
        Ok(self
            .get_all_stored_messages()
            .await?
            .into_iter()
            .map(Self::strip_metadata)
            .collect())
    }

    /// Full history, oldest first, with ids and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Persistence`] if the store cannot be read.
    pub async fn get_all_stored_messages(&self) -> Result<Vec<StoredMessage>> {
        Ok(self.store.load().await?.messages)
    }

    /// Number of stored messages.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Persistence`] if the store cannot be read.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.store.load().await?.messages.len())
    }

    /// Whether the history is empty.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Persistence`] if the store cannot be read.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Appends a `tool` message carrying `result` and answering `tool_call_id`.
    ///
    /// `result` is an opaque payload; callers serialize structured results
    /// themselves.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownToolCall`] if validation is enabled and the
    /// most recent assistant turn did not request `tool_call_id`, or
    /// [`CoreError::Persistence`] if the store fails.
    pub async fn record_tool_response(
        &self,
        tool_call_id: &str,
        result: impl Into<String> + Send,
    ) -> Result<()> {
        let message = Message::tool(tool_call_id, result);

        let _guard = self.write_lock.lock().await;
        let document = self.store.load().await?;

        if !is_pending_tool_call(&document.messages, tool_call_id) {
            if self.validate_tool_calls {
                warn!("Rejecting tool response for unrequested call id {tool_call_id}");
                return Err(CoreError::UnknownToolCall(tool_call_id.to_string()));
            }
            warn!("Recording tool response for unrequested call id {tool_call_id}");
        }

        self.commit(document, vec![message]).await
    }

    async fn commit(&self, mut document: StoreDocument, messages: Vec<Message>) -> Result<()> {
        let added = messages.len();
        document
            .messages
            .extend(messages.iter().map(|m| self.enrich_with_metadata(m)));

        self.store.save(&document).await?;
        debug!(
            "Appended {added} messages, store now holds {}",
            document.messages.len()
        );
        Ok(())
    }
}

/// Whether the most recent assistant turn requested `tool_call_id`.
fn is_pending_tool_call(history: &[StoredMessage], tool_call_id: &str) -> bool {
    history
        .iter()
        .rev()
        .find(|stored| stored.message.role == MessageRole::Assistant)
        .is_some_and(|stored| {
            stored
                .message
                .tool_calls
                .iter()
                .any(|call| call.id == tool_call_id)
        })
}
