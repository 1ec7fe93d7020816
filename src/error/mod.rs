//! # Error Module
//!
//! Error types for the deduplication pipeline.
//!
//! ## Taxonomy
//! - [`ExtractionError`] - one image could not be fingerprinted. Recoverable:
//!   the image is skipped and reported in the failure list.
//! - [`ConfigError`] - invalid configuration, or a checkpoint written with a
//!   different configuration. A mismatch on resume is recoverable (fresh start).
//! - [`CheckpointError`] - the checkpoint itself cannot be read or written.
//!   Fatal, because progress durability can no longer be guaranteed.
//! - [`ScanError`] - the target directory cannot be enumerated. Fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Discovery error: {0}")]
    Scan(#[from] ScanError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Run was cancelled; completed work was kept in the checkpoint")]
    Cancelled,
}

/// Errors that occur while discovering candidate files
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while extracting one image's record
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to read image file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported image format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Image {path} is {width}x{height}, below the minimum side of {min_resolution}px")]
    BelowMinimumResolution {
        path: PathBuf,
        width: u32,
        height: u32,
        min_resolution: u32,
    },

    #[error("Image is empty or corrupted: {path}")]
    EmptyImage { path: PathBuf },
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid hash size: {value} (must be 8, 16 or 32)")]
    InvalidHashSize { value: u32 },

    #[error("Invalid checkpoint interval: {value} (must be at least 1)")]
    InvalidCheckpointInterval { value: usize },

    #[error("Invalid structural similarity threshold: {value} (must be in (0, 1])")]
    InvalidStructuralThreshold { value: f64 },

    #[error("Checkpoint was written with {field} = {stored}, current run uses {current}")]
    Mismatch {
        field: &'static str,
        stored: u32,
        current: u32,
    },
}

/// Errors that occur reading or writing the checkpoint
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint corruption detected at {path}: {reason}. Delete this file and try again.")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Failed to serialize checkpoint: {0}")]
    Serialization(String),

    #[error("Checkpoint store failure: {0}")]
    Store(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, DedupError>;
