//! # Core Module
//!
//! The presentation-agnostic duplicate detection engine.
//!
//! ## Modules
//! - `scanner` - Discovers candidate images in a directory tree
//! - `fingerprint` - Computes rotation-aware perceptual hashes
//! - `metadata` - The per-image record and its quality metadata
//! - `bucketing` - Partitions records by aspect ratio
//! - `comparator` - Finds duplicate pairs inside a bucket
//! - `cluster` - Merges pairs into transitive groups
//! - `quality` - Scores group members and picks keepers
//! - `checkpoint` - Persists extraction progress for resume
//! - `pipeline` - Orchestrates the full workflow

pub mod bucketing;
pub mod checkpoint;
pub mod cluster;
pub mod comparator;
pub mod config;
pub mod fingerprint;
pub mod metadata;
pub mod pipeline;
pub mod quality;
pub mod scanner;

// Re-export commonly used types
pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore, JsonFileStore, SqliteStore};
pub use comparator::MatchResult;
pub use config::DedupConfig;
pub use fingerprint::{Fingerprint, FingerprintEngine, RecordExtractor, Rotation};
pub use metadata::{ImageFormat, ImageRecord};
pub use pipeline::{CancellationToken, ExtractionFailure, Pipeline, PipelineResult};
pub use quality::{DuplicateGroup, ScoredMember};
