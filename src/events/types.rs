//! Event type definitions for progress reporting.
//!
//! Every event is a plain value object: subscribers receive snapshots and
//! never read shared pipeline state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the deduplication pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Discovery phase events
    Scan(ScanEvent),
    /// Extraction phase events
    Extract(ExtractEvent),
    /// Checkpoint lifecycle events
    Checkpoint(CheckpointEvent),
    /// Comparison phase events
    Compare(CompareEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events during directory discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Discovery has started
    Started { root: PathBuf },
    /// Progress update during discovery
    Progress(ScanProgress),
    /// An entry could not be read but discovery continues
    Error { path: PathBuf, message: String },
    /// Discovery completed
    Completed { total_images: usize },
}

/// Progress information during discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of directories entered so far
    pub directories_scanned: usize,
    /// Number of candidate images found so far
    pub images_found: usize,
    /// Directory being scanned
    pub current_path: PathBuf,
}

/// Events during record extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExtractEvent {
    /// Extraction has started
    Started {
        /// Images discovered this run
        total_images: usize,
        /// Images already covered by a resumed checkpoint
        already_processed: usize,
    },
    /// One image finished, successfully or not
    Progress(ExtractProgress),
    /// An image could not be extracted and was skipped
    Failed { path: PathBuf, reason: String },
    /// Extraction completed
    Completed {
        extracted: usize,
        failed: usize,
        resumed: usize,
    },
}

/// Progress information during extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractProgress {
    /// Images handled so far, including resumed ones
    pub completed: usize,
    /// Total images in this run
    pub total: usize,
    /// Images restored from the checkpoint
    pub resumed: usize,
    /// Failures so far
    pub failures: usize,
    /// Image just handled
    pub current_path: PathBuf,
}

impl ExtractProgress {
    /// Completion, 0-100
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}

/// Checkpoint lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CheckpointEvent {
    /// A previous checkpoint was loaded and accepted
    Resumed {
        path: PathBuf,
        records: usize,
        /// Seconds since the epoch at which it was saved
        saved_at: f64,
    },
    /// A previous checkpoint was discarded
    Rejected { path: PathBuf, reason: String },
    /// Progress was saved
    Saved { path: PathBuf, records: usize },
    /// The checkpoint was removed after a completed run
    Cleared { path: PathBuf },
}

/// Events during the comparison phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompareEvent {
    /// Comparison has started
    Started {
        total_records: usize,
        buckets: usize,
        total_comparisons: u64,
    },
    /// A bucket finished comparing
    Progress(CompareProgress),
    /// Comparison completed
    Completed { comparisons: u64, matches: usize },
}

/// Progress information during comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareProgress {
    pub buckets_completed: usize,
    pub total_buckets: usize,
    pub comparisons_completed: u64,
    pub total_comparisons: u64,
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started,
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed successfully
    Completed { summary: PipelineSummary },
    /// Pipeline was cancelled after flushing completed work
    Cancelled,
    /// Pipeline encountered a fatal error
    Error { message: String },
}

/// Phases of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Discovering,
    Extracting,
    Comparing,
    Clustering,
    Scoring,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Discovering => write!(f, "Discovering"),
            PipelinePhase::Extracting => write!(f, "Extracting"),
            PipelinePhase::Comparing => write!(f, "Comparing"),
            PipelinePhase::Clustering => write!(f, "Clustering"),
            PipelinePhase::Scoring => write!(f, "Scoring"),
        }
    }
}

/// Summary of pipeline results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Images discovered this run
    pub total_images: usize,
    /// Records restored from a checkpoint
    pub resumed: usize,
    /// Records extracted this run
    pub extracted: usize,
    /// Images that could not be extracted
    pub failures: usize,
    /// Pairwise comparisons performed
    pub comparisons: u64,
    /// Comparisons an unbucketed search would need
    pub naive_comparisons: u64,
    /// Edges that survived threshold and refinement
    pub matches: usize,
    /// Number of duplicate groups found
    pub duplicate_groups: usize,
    /// Images that are not their group's keeper
    pub duplicate_count: usize,
    /// Bytes freed by removing every non-keeper
    pub reclaimable_bytes: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}
