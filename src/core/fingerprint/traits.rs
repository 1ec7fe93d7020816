//! Trait definitions for record extraction.

use crate::core::metadata::ImageRecord;
use crate::error::ExtractionError;
use std::path::Path;

/// Turns one image file into an [`ImageRecord`].
///
/// Implementations are called from several worker threads at once and must
/// not keep per-image state between calls.
pub trait RecordExtractor: Send + Sync {
    /// Read, decode and fingerprint the file at `path`
    fn extract(&self, path: &Path) -> Result<ImageRecord, ExtractionError>;

    /// Fingerprint grid side this extractor produces
    fn hash_size(&self) -> u32;
}
