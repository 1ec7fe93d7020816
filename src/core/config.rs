//! Run configuration.
//!
//! All knobs consumed by the core live in [`DedupConfig`]. It is validated
//! once, when the pipeline is built, never lazily per access.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hash sizes (grid side) the fingerprint engine accepts
pub const SUPPORTED_HASH_SIZES: [u32; 3] = [8, 16, 32];

/// Default file name of the checkpoint inside the scanned directory
pub const CHECKPOINT_FILE_NAME: &str = ".dedup_checkpoint.json";

/// Configuration of one deduplication run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Maximum Hamming distance for two images to be duplicates
    pub threshold: u32,
    /// Fingerprint grid side (8, 16 or 32)
    pub hash_size: u32,
    /// Smallest accepted image side, in pixels
    pub min_resolution: u32,
    /// Confirm hash matches with structural similarity
    pub use_structural_refinement: bool,
    /// Minimum structural similarity for a confirmed edge
    pub structural_threshold: f64,
    /// Images extracted between checkpoint saves
    pub checkpoint_interval: usize,
    /// Resume from an existing checkpoint
    pub resume: bool,
    /// Where the checkpoint lives (None = inside the scanned directory)
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            hash_size: 8,
            min_resolution: 100,
            use_structural_refinement: false,
            structural_threshold: 0.95,
            checkpoint_interval: 100,
            resume: false,
            checkpoint_path: None,
        }
    }
}

impl DedupConfig {
    /// Check every field, returning the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_HASH_SIZES.contains(&self.hash_size) {
            return Err(ConfigError::InvalidHashSize {
                value: self.hash_size,
            });
        }

        if self.checkpoint_interval == 0 {
            return Err(ConfigError::InvalidCheckpointInterval {
                value: self.checkpoint_interval,
            });
        }

        if !(self.structural_threshold > 0.0 && self.structural_threshold <= 1.0) {
            return Err(ConfigError::InvalidStructuralThreshold {
                value: self.structural_threshold,
            });
        }

        Ok(())
    }

    /// Number of bits in each fingerprint for this configuration
    pub fn fingerprint_bits(&self) -> usize {
        (self.hash_size * self.hash_size) as usize
    }

    /// The subset of the configuration stored in (and checked against) a checkpoint
    pub fn checkpoint_config(&self) -> CheckpointConfig {
        CheckpointConfig {
            threshold: self.threshold,
            hash_size: self.hash_size,
            min_resolution: self.min_resolution,
        }
    }

    /// Resolve the checkpoint location for a scan of `root`
    pub fn checkpoint_path_for(&self, root: &Path) -> PathBuf {
        self.checkpoint_path
            .clone()
            .unwrap_or_else(|| root.join(CHECKPOINT_FILE_NAME))
    }
}

/// Configuration fields that must match for a checkpoint to be resumable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub threshold: u32,
    pub hash_size: u32,
    pub min_resolution: u32,
}

impl CheckpointConfig {
    /// Compare field by field against the current run
    pub fn ensure_matches(&self, current: &CheckpointConfig) -> Result<(), ConfigError> {
        let fields = [
            ("threshold", self.threshold, current.threshold),
            ("hash_size", self.hash_size, current.hash_size),
            ("min_resolution", self.min_resolution, current.min_resolution),
        ];

        for (field, stored, current) in fields {
            if stored != current {
                return Err(ConfigError::Mismatch {
                    field,
                    stored,
                    current,
                });
            }
        }

        Ok(())
    }
}

/// Threshold to use at `hash_size` to keep the strictness of `base` at size 8.
///
/// Fingerprint length grows with the square of the grid side, so doubling
/// the hash size calls for roughly four times the threshold. This is a
/// documented mapping for operators; the pipeline never applies it on its own.
pub fn recommended_threshold(base: u32, hash_size: u32) -> u32 {
    let factor = (hash_size / 8).max(1);
    base * factor * factor
}
