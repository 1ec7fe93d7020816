//! In-memory checkpoint store for testing.

use super::CheckpointStore;
use crate::error::CheckpointError;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// In-memory checkpoint store
///
/// Clones share the same slot, so a test can keep one handle while the
/// pipeline owns another and observe what was saved.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    document: Arc<RwLock<Option<Vec<u8>>>>,
    writes: Arc<RwLock<usize>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.read().map(|w| *w).unwrap_or(0)
    }

    /// Whether a document is currently stored
    pub fn is_present(&self) -> bool {
        self.document.read().map(|d| d.is_some()).unwrap_or(false)
    }

    fn poisoned() -> CheckpointError {
        CheckpointError::Store("in-memory checkpoint lock poisoned".to_string())
    }
}

impl CheckpointStore for InMemoryStore {
    fn read(&self) -> Result<Option<Vec<u8>>, CheckpointError> {
        let document = self.document.read().map_err(|_| Self::poisoned())?;
        Ok(document.clone())
    }

    fn write(&self, document: &[u8]) -> Result<(), CheckpointError> {
        let mut slot = self.document.write().map_err(|_| Self::poisoned())?;
        *slot = Some(document.to_vec());
        let mut writes = self.writes.write().map_err(|_| Self::poisoned())?;
        *writes += 1;
        Ok(())
    }

    fn remove(&self) -> Result<bool, CheckpointError> {
        let mut slot = self.document.write().map_err(|_| Self::poisoned())?;
        Ok(slot.take().is_some())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("memory")
    }
}
