//! Durable storage backends for the offline message queue.

use std::fs;
use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::queue::QueuedMessage;

/// Persistence seam for the queue. Implementations must treat missing or
/// corrupted state as an empty queue rather than an error.
pub trait QueueStorage: Send + Sync {
    /// Load the persisted entries, empty when missing/corrupt
    fn load(&self) -> Vec<QueuedMessage>;

    /// Persist the full entry list
    fn save(&self, entries: &[QueuedMessage]) -> io::Result<()>;
}

/// Queue state stored as a single JSON document at a fixed path.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl QueueStorage for JsonFileStorage {
    fn load(&self) -> Vec<QueuedMessage> {
        if !self.path.exists() {
            return Vec::new();
        }

        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %self.path.display(),
                    "Corrupted queue state, starting empty: {e}"
                );
                Vec::new()
            }),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Failed to read queue state, starting empty: {e}"
                );
                Vec::new()
            }
        }
    }

    fn save(&self, entries: &[QueuedMessage]) -> io::Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                parent.to_path_buf()
            }
            _ => PathBuf::from("."),
        };

        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // Write-then-rename so a crash mid-write never corrupts the queue
        let tmp = tempfile::NamedTempFile::new_in(parent)?;
        fs::write(tmp.path(), contents)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Volatile storage for tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<Vec<QueuedMessage>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStorage for MemoryStorage {
    fn load(&self) -> Vec<QueuedMessage> {
        self.entries.lock().clone()
    }

    fn save(&self, entries: &[QueuedMessage]) -> io::Result<()> {
        *self.entries.lock() = entries.to_vec();
        Ok(())
    }
}
