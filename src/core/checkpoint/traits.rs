//! Checkpoint store trait definition.

use crate::error::CheckpointError;
use std::path::PathBuf;

/// A single-record store holding the encoded checkpoint document.
///
/// Implementations must replace the document atomically: a reader sees
/// either the previous document or the new one, never a mix.
pub trait CheckpointStore: Send + Sync {
    /// Read the stored document, or None if there is none
    fn read(&self) -> Result<Option<Vec<u8>>, CheckpointError>;

    /// Replace the stored document
    fn write(&self, document: &[u8]) -> Result<(), CheckpointError>;

    /// Delete the stored document; false if there was nothing to delete
    fn remove(&self) -> Result<bool, CheckpointError>;

    /// Where the document lives, for diagnostics
    fn location(&self) -> PathBuf;
}
