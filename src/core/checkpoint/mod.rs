//! # Checkpoint Module
//!
//! Persists and restores extraction progress so long runs survive being
//! interrupted.
//!
//! ## Document Format
//! ```json
//! {
//!   "processed_files": ["/photos/a.jpg", ...],
//!   "image_metadata": [{ "path": ..., "phash": "c3f1...", ... }, ...],
//!   "timestamp": 1712345678.25,
//!   "config": { "threshold": 10, "hash_size": 8, "min_resolution": 100 }
//! }
//! ```
//! Unknown fields are ignored on read, so documents written by other
//! versions of the tool load as long as the required fields are present.
//!
//! ## Lifecycle
//! `NoCheckpoint -> Active -> (interrupted) -> Resumed -> Active -> Completed`
//!
//! The [`CheckpointManager`] only encodes, decodes and validates. When to
//! save and when to clear is decided by the pipeline.

mod json;
mod memory;
mod sqlite;
mod traits;

pub use json::JsonFileStore;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::CheckpointStore;

use crate::core::config::CheckpointConfig;
use crate::core::fingerprint::{Fingerprint, RotatedFingerprints};
use crate::core::metadata::{ImageFormat, ImageRecord};
use crate::error::{CheckpointError, ConfigError};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// On-disk shape of the whole document
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointDocument {
    processed_files: Vec<PathBuf>,
    image_metadata: Vec<StoredRecord>,
    timestamp: f64,
    config: StoredConfig,
}

/// On-disk shape of the configuration block; extra keys are ignored
#[derive(Debug, Serialize, Deserialize)]
struct StoredConfig {
    threshold: u32,
    hash_size: u32,
    min_resolution: u32,
}

/// On-disk shape of one record.
///
/// The scoring fields are written with neutral values and ignored on read:
/// scores are always recomputed against the final groups.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    path: PathBuf,
    width: u32,
    height: u32,
    #[serde(default)]
    resolution: u64,
    file_size: u64,
    format: ImageFormat,
    #[serde(default)]
    bit_depth: Option<u32>,
    #[serde(default)]
    has_exif: bool,
    #[serde(default)]
    is_lossless: bool,
    #[serde(default)]
    aspect_ratio: f64,
    phash: Fingerprint,
    phash_90: Fingerprint,
    phash_180: Fingerprint,
    phash_270: Fingerprint,
    #[serde(default)]
    quality_score: f64,
    #[serde(default)]
    group_id: Option<usize>,
    #[serde(default)]
    is_recommended_keeper: bool,
}

impl From<&ImageRecord> for StoredRecord {
    fn from(record: &ImageRecord) -> Self {
        Self {
            path: record.path.clone(),
            width: record.width,
            height: record.height,
            resolution: record.resolution(),
            file_size: record.file_size,
            format: record.format.clone(),
            bit_depth: record.bit_depth,
            has_exif: record.has_exif,
            is_lossless: record.is_lossless(),
            aspect_ratio: record.aspect_ratio(),
            phash: record.fingerprints.r0.clone(),
            phash_90: record.fingerprints.r90.clone(),
            phash_180: record.fingerprints.r180.clone(),
            phash_270: record.fingerprints.r270.clone(),
            quality_score: 0.0,
            group_id: None,
            is_recommended_keeper: false,
        }
    }
}

impl From<StoredRecord> for ImageRecord {
    fn from(stored: StoredRecord) -> Self {
        Self {
            path: stored.path,
            width: stored.width,
            height: stored.height,
            file_size: stored.file_size,
            format: stored.format,
            bit_depth: stored.bit_depth,
            has_exif: stored.has_exif,
            fingerprints: RotatedFingerprints {
                r0: stored.phash,
                r90: stored.phash_90,
                r180: stored.phash_180,
                r270: stored.phash_270,
            },
        }
    }
}

/// Seconds since the Unix epoch, with sub-second precision
fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A decoded snapshot of extraction progress
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Paths whose records are complete
    pub processed: BTreeSet<PathBuf>,
    /// Records of the processed paths
    pub records: Vec<ImageRecord>,
    /// When the snapshot was taken, in seconds since the epoch
    pub timestamp: f64,
    /// Configuration the records were extracted with
    pub config: CheckpointConfig,
}

impl Checkpoint {
    /// Snapshot taken now
    pub fn new(records: Vec<ImageRecord>, processed: BTreeSet<PathBuf>, config: CheckpointConfig) -> Self {
        Self {
            processed,
            records,
            timestamp: now_timestamp(),
            config,
        }
    }

    /// Encode as a pretty-printed JSON document
    pub fn encode(&self) -> Result<Vec<u8>, CheckpointError> {
        encode_document(&self.records, &self.processed, self.timestamp, &self.config)
    }

    /// Decode a document read from `location`
    pub fn decode(bytes: &[u8], location: &Path) -> Result<Self, CheckpointError> {
        let document: CheckpointDocument =
            serde_json::from_slice(bytes).map_err(|e| CheckpointError::Corrupted {
                path: location.to_path_buf(),
                reason: e.to_string(),
            })?;

        let records: Vec<ImageRecord> = document
            .image_metadata
            .into_iter()
            .map(ImageRecord::from)
            .collect();

        for record in &records {
            if record.fingerprints.uniform_bit_len().is_none() {
                return Err(CheckpointError::Corrupted {
                    path: location.to_path_buf(),
                    reason: format!("fingerprints of {} differ in length", record.path.display()),
                });
            }
        }

        Ok(Self {
            processed: document.processed_files.into_iter().collect(),
            records,
            timestamp: document.timestamp,
            config: CheckpointConfig {
                threshold: document.config.threshold,
                hash_size: document.config.hash_size,
                min_resolution: document.config.min_resolution,
            },
        })
    }

    /// The save time, if the timestamp is representable
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() {
            return None;
        }
        let secs = self.timestamp.floor();
        let nanos = ((self.timestamp - secs) * 1_000_000_000.0) as u32;
        DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
    }

    /// Human-readable local save time
    pub fn saved_at_display(&self) -> String {
        match self.saved_at() {
            Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "unknown time".to_string(),
        }
    }

    /// Check every record against the fingerprint length of `hash_size`
    fn ensure_fingerprint_bits(&self, hash_size: u32, location: &Path) -> Result<(), CheckpointError> {
        let expected = (hash_size * hash_size) as usize;
        match self
            .records
            .iter()
            .find(|r| r.fingerprints.uniform_bit_len() != Some(expected))
        {
            Some(record) => Err(CheckpointError::Corrupted {
                path: location.to_path_buf(),
                reason: format!(
                    "fingerprint of {} is not {} bits long",
                    record.path.display(),
                    expected
                ),
            }),
            None => Ok(()),
        }
    }
}

fn encode_document(
    records: &[ImageRecord],
    processed: &BTreeSet<PathBuf>,
    timestamp: f64,
    config: &CheckpointConfig,
) -> Result<Vec<u8>, CheckpointError> {
    let mut image_metadata: Vec<StoredRecord> = records.iter().map(StoredRecord::from).collect();
    image_metadata.sort_by(|a, b| a.path.cmp(&b.path));

    let document = CheckpointDocument {
        processed_files: processed.iter().cloned().collect(),
        image_metadata,
        timestamp,
        config: StoredConfig {
            threshold: config.threshold,
            hash_size: config.hash_size,
            min_resolution: config.min_resolution,
        },
    };

    serde_json::to_vec_pretty(&document).map_err(|e| CheckpointError::Serialization(e.to_string()))
}

/// Where the manager is in the checkpoint lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    /// Nothing saved or loaded yet
    NoCheckpoint,
    /// Loaded and validated, not yet saved again
    Resumed,
    /// At least one save in this run
    Active,
    /// Cleared after a finished run
    Completed,
}

/// What a resume attempt found
#[derive(Debug)]
pub enum ResumeOutcome {
    /// No checkpoint stored
    NotFound,
    /// A checkpoint exists but was written with a different configuration
    Rejected(ConfigError),
    /// A compatible checkpoint was loaded
    Resumed(Checkpoint),
}

/// Saves, loads and validates checkpoints through a [`CheckpointStore`]
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    config: CheckpointConfig,
    state: CheckpointState,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>, config: CheckpointConfig) -> Self {
        Self {
            store,
            config,
            state: CheckpointState::NoCheckpoint,
        }
    }

    /// Manager backed by a JSON file at `path`
    pub fn json(path: impl Into<PathBuf>, config: CheckpointConfig) -> Self {
        Self::new(Arc::new(JsonFileStore::new(path)), config)
    }

    pub fn state(&self) -> CheckpointState {
        self.state
    }

    pub fn location(&self) -> PathBuf {
        self.store.location()
    }

    /// Durably replace the stored checkpoint.
    ///
    /// Callers must pass only fully extracted records.
    pub fn save(&mut self, records: &[ImageRecord], processed: &BTreeSet<PathBuf>) -> Result<(), CheckpointError> {
        let document = encode_document(records, processed, now_timestamp(), &self.config)?;
        self.store.write(&document)?;

        self.state = CheckpointState::Active;
        tracing::debug!(
            "Checkpoint saved to {} ({} records)",
            self.store.location().display(),
            records.len()
        );
        Ok(())
    }

    /// Load the stored checkpoint without validating it
    pub fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.store.read()? {
            Some(bytes) => Checkpoint::decode(&bytes, &self.store.location()).map(Some),
            None => Ok(None),
        }
    }

    /// Compare a checkpoint's configuration with this run's
    pub fn validate(&self, checkpoint: &Checkpoint) -> Result<(), ConfigError> {
        checkpoint.config.ensure_matches(&self.config)
    }

    /// Load and validate in one step.
    ///
    /// A configuration mismatch is not an error: the caller starts fresh.
    /// An unreadable or corrupted checkpoint is.
    pub fn resume(&mut self) -> Result<ResumeOutcome, CheckpointError> {
        let location = self.store.location();
        let checkpoint = match self.load()? {
            Some(checkpoint) => checkpoint,
            None => {
                tracing::debug!("No checkpoint at {}", location.display());
                return Ok(ResumeOutcome::NotFound);
            }
        };

        if let Err(mismatch) = self.validate(&checkpoint) {
            tracing::warn!(
                "Ignoring checkpoint at {}: {}. Starting fresh.",
                location.display(),
                mismatch
            );
            return Ok(ResumeOutcome::Rejected(mismatch));
        }

        checkpoint.ensure_fingerprint_bits(self.config.hash_size, &location)?;

        tracing::info!(
            "Resuming from checkpoint saved at {} ({} images already processed)",
            checkpoint.saved_at_display(),
            checkpoint.processed.len()
        );
        self.state = CheckpointState::Resumed;
        Ok(ResumeOutcome::Resumed(checkpoint))
    }

    /// Delete the stored checkpoint after a finished run
    pub fn clear(&mut self) -> Result<bool, CheckpointError> {
        let removed = self.store.remove()?;
        self.state = CheckpointState::Completed;
        if removed {
            tracing::info!("Checkpoint cleared: {}", self.store.location().display());
        }
        Ok(removed)
    }
}
