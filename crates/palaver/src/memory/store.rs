//! Persistence backends for the conversation log.
//!
//! The whole log is one document, `{"messages": [...]}`, read fully and
//! written fully on every operation.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use palaver_common::StoredMessage;

/// Errors from reading or writing the conversation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document could not be encoded, or the file on disk is corrupt.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The blocking I/O task was cancelled or panicked.
    #[error("Task join error: {0}")]
    Task(String),
}

/// The persisted document: every stored message, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Ordered append log of enriched messages.
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// A whole-document store.
///
/// `save` must replace the previous document all-or-nothing: after a failed
/// save, `load` returns the prior state.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Reads the full document.
    async fn load(&self) -> Result<StoreDocument, StoreError>;

    /// Replaces the full document.
    async fn save(&self, document: &StoreDocument) -> Result<(), StoreError>;
}

/// Stores the log as a single pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: Arc<PathBuf>,
}

impl JsonFileStore {
    /// Opens the store at `path`, creating parent directories and an empty
    /// `{"messages": []}` document if the file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories or the initial file cannot be created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            path: Arc::new(path.into()),
        };

        store
            .run(|path| {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                if !path.exists() {
                    let json = serde_json::to_string_pretty(&StoreDocument::default())?;
                    write_atomic(path, &json)?;
                    debug!("Created empty message store at {}", path.display());
                }
                Ok(())
            })
            .await?;

        Ok(store)
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs a synchronous closure on the blocking thread pool.
    async fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || f(&path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl MessageStore for JsonFileStore {
    async fn load(&self) -> Result<StoreDocument, StoreError> {
        self.run(|path| {
            let json = fs::read_to_string(path)?;
            let document: StoreDocument = serde_json::from_str(&json)?;
            Ok(document)
        })
        .await
    }

    async fn save(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(document)?;
        let count = document.messages.len();

        self.run(move |path| {
            write_atomic(path, &json)?;
            debug!(
                "Saved {count} messages ({} bytes) to {}",
                json.len(),
                path.display()
            );
            Ok(())
        })
        .await
    }
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let temp = temp_path(path);
    fs::write(&temp, contents)?;
    fs::rename(&temp, path)?;
    Ok(())
}

/// `<file name>.tmp` next to `path`, distinct from `path` for any file name.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsStr::to_os_string).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Volatile store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    document: Mutex<StoreDocument>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn load(&self) -> Result<StoreDocument, StoreError> {
        Ok(self
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, document: &StoreDocument) -> Result<(), StoreError> {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = document.clone();
        Ok(())
    }
}
