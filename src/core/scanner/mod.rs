//! # Scanner Module
//!
//! Discovers candidate image files under one directory.
//!
//! ## Discovered Extensions
//! - JPEG (.jpg, .jpeg)
//! - PNG (.png)
//! - BMP (.bmp)
//! - GIF (.gif)
//! - TIFF (.tiff, .tif)
//! - WebP (.webp)
//!
//! Paths are returned absolute and sorted. The order carries no meaning for
//! the pipeline; sorting only makes runs reproducible.
//!
//! ## Example
//! ```rust,ignore
//! use image_dedup::core::scanner::{ImageScanner, ScanConfig, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let result = scanner.scan(Path::new("/Users/photos"))?;
//! ```

mod filter;
mod walker;

pub use filter::{ImageFilter, DEFAULT_EXTENSIONS};
pub use walker::{ScanConfig, WalkDirScanner};

use crate::error::ScanError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An entry below the root that could not be read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub message: String,
}

/// Result of a scan operation
#[derive(Debug)]
pub struct ScanResult {
    /// Canonical form of the scanned root
    pub root: PathBuf,
    /// Candidate images, absolute and sorted
    pub images: Vec<PathBuf>,
    /// Entries that could not be read (non-fatal)
    pub skipped: Vec<SkippedEntry>,
}

/// Trait for image discovery
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait ImageScanner: Send + Sync {
    /// Scan a directory tree and return candidate images
    fn scan(&self, root: &Path) -> Result<ScanResult, ScanError>;

    /// Scan with progress reporting via events
    fn scan_with_events(&self, root: &Path, events: &EventSender) -> Result<ScanResult, ScanError>;
}
