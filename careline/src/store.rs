//! Persistent pointer to the current AI group.
//!
//! The AI-group identity is the one piece of session state that must
//! survive process restarts, so it lives behind the
//! [`AiGroupPointerStore`] collaborator: a single string slot, written
//! synchronously with the in-memory state change it mirrors.

use std::path::PathBuf;

use parking_lot::Mutex;

/// Errors from the pointer store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing storage failed.
    #[error("pointer store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Single-slot persistent store for the current AI group id.
pub trait AiGroupPointerStore: Send + Sync + 'static {
    /// Reads the stored group id, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be read.
    fn get(&self) -> Result<Option<String>, StoreError>;

    /// Stores `group_id`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be written.
    fn set(&self, group_id: &str) -> Result<(), StoreError>;

    /// Clears the slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be written.
    fn clear(&self) -> Result<(), StoreError>;
}

/// File-backed pointer store: one id on one line.
#[derive(Debug, Clone)]
pub struct FilePointerStore {
    path: PathBuf,
}

impl FilePointerStore {
    /// Creates a store backed by the given file path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The conventional per-user location
    /// (`<data dir>/careline/ai_group`), when one can be determined.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("careline").join("ai_group"))
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl AiGroupPointerStore for FilePointerStore {
    fn get(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let id = contents.trim();
                if id.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(id.to_string()))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, group_id: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, group_id)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory pointer store for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryPointerStore {
    slot: std::sync::Arc<Mutex<Option<String>>>,
}

impl MemoryPointerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AiGroupPointerStore for MemoryPointerStore {
    fn get(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slot.lock().clone())
    }

    fn set(&self, group_id: &str) -> Result<(), StoreError> {
        *self.slot.lock() = Some(group_id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock() = None;
        Ok(())
    }
}
