//! Pipeline execution implementation.

use crate::core::bucketing::{BucketIndex, BucketStats};
use crate::core::checkpoint::{CheckpointManager, CheckpointStore, ResumeOutcome};
use crate::core::cluster::{Cluster, ClusterBuilder};
use crate::core::comparator::{
    BucketComparator, BucketComparison, MatchResult, SsimRefiner, StructuralRefiner, ThresholdStrategy,
};
use crate::core::config::DedupConfig;
use crate::core::fingerprint::{FingerprintEngine, RecordExtractor};
use crate::core::metadata::ImageRecord;
use crate::core::quality::{DuplicateGroup, QualityScorer};
use crate::core::scanner::{ImageScanner, ScanConfig, WalkDirScanner};
use crate::error::{ConfigError, DedupError, ExtractionError};
use crate::events::{
    null_sender, CheckpointEvent, CompareEvent, CompareProgress, Event, EventSender, ExtractEvent,
    ExtractProgress, PipelineEvent, PipelinePhase, PipelineSummary,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// An image that could not be extracted, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl ExtractionFailure {
    fn new(path: PathBuf, error: &ExtractionError) -> Self {
        Self {
            path,
            reason: error.to_string(),
        }
    }
}

/// Result of pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Scored duplicate groups, ordered by first path
    pub groups: Vec<DuplicateGroup>,
    /// Images skipped because extraction failed, ordered by path
    pub failures: Vec<ExtractionFailure>,
    /// Every confirmed duplicate pair
    pub matches: Vec<MatchResult>,
    /// Comparison-space reduction achieved by bucketing
    pub bucket_stats: BucketStats,
    pub summary: PipelineSummary,
}

/// Cooperative cancellation shared between a caller and a running pipeline.
///
/// Cancelling stops extraction at the next image; completed records are
/// flushed to the checkpoint before the run returns [`DedupError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    config: DedupConfig,
    scan_config: ScanConfig,
    extractor: Option<Arc<dyn RecordExtractor>>,
    store: Option<Arc<dyn CheckpointStore>>,
    refiner: Option<Box<dyn StructuralRefiner>>,
    cancellation: CancellationToken,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: DedupConfig::default(),
            scan_config: ScanConfig::default(),
            extractor: None,
            store: None,
            refiner: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Replace the whole run configuration
    pub fn config(mut self, config: DedupConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the comparison threshold (maximum Hamming distance)
    pub fn threshold(mut self, threshold: u32) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the fingerprint grid side (8, 16 or 32)
    pub fn hash_size(mut self, hash_size: u32) -> Self {
        self.config.hash_size = hash_size;
        self
    }

    /// Set the minimum accepted image side
    pub fn min_resolution(mut self, min_resolution: u32) -> Self {
        self.config.min_resolution = min_resolution;
        self
    }

    /// Confirm hash matches with structural similarity
    pub fn structural_refinement(mut self, enabled: bool) -> Self {
        self.config.use_structural_refinement = enabled;
        self
    }

    pub fn structural_threshold(mut self, threshold: f64) -> Self {
        self.config.structural_threshold = threshold;
        self
    }

    /// Images extracted between checkpoint saves
    pub fn checkpoint_interval(mut self, interval: usize) -> Self {
        self.config.checkpoint_interval = interval;
        self
    }

    /// Keep the checkpoint in a JSON file at `path`
    pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.checkpoint_path = Some(path.into());
        self
    }

    /// Keep the checkpoint in a custom store; takes precedence over the path
    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Resume from an existing checkpoint
    pub fn resume(mut self, resume: bool) -> Self {
        self.config.resume = resume;
        self
    }

    /// Set scanner configuration
    pub fn scan_config(mut self, config: ScanConfig) -> Self {
        self.scan_config = config;
        self
    }

    /// Include hidden files
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.scan_config.include_hidden = include;
        self
    }

    /// Replace the fingerprint engine
    pub fn extractor(mut self, extractor: Arc<dyn RecordExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Replace the structural refiner; enables refinement
    pub fn refiner(mut self, refiner: Box<dyn StructuralRefiner>) -> Self {
        self.config.use_structural_refinement = true;
        self.refiner = Some(refiner);
        self
    }

    /// Share a cancellation token with the caller
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Validate the configuration and build the pipeline
    pub fn build(self) -> Result<Pipeline, ConfigError> {
        self.config.validate()?;

        let extractor: Arc<dyn RecordExtractor> = match self.extractor {
            Some(extractor) => extractor,
            None => Arc::new(FingerprintEngine::from_config(&self.config)),
        };

        if extractor.hash_size() != self.config.hash_size {
            return Err(ConfigError::Mismatch {
                field: "hash_size",
                stored: extractor.hash_size(),
                current: self.config.hash_size,
            });
        }

        let refiner = if self.config.use_structural_refinement {
            Some(
                self.refiner
                    .unwrap_or_else(|| Box::new(SsimRefiner::new(self.config.structural_threshold))),
            )
        } else {
            None
        };

        Ok(Pipeline {
            config: self.config,
            scan_config: self.scan_config,
            extractor,
            store: self.store,
            refiner,
            scorer: QualityScorer::default(),
            cancellation: self.cancellation,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The duplicate detection pipeline
pub struct Pipeline {
    config: DedupConfig,
    scan_config: ScanConfig,
    extractor: Arc<dyn RecordExtractor>,
    store: Option<Arc<dyn CheckpointStore>>,
    refiner: Option<Box<dyn StructuralRefiner>>,
    scorer: QualityScorer,
    cancellation: CancellationToken,
}

/// Records and processed paths accumulated during extraction
#[derive(Default)]
struct ExtractionState {
    records: Vec<ImageRecord>,
    processed: BTreeSet<PathBuf>,
    failures: Vec<ExtractionFailure>,
    resumed: usize,
    extracted: usize,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// A handle that cancels this pipeline's runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Scan `root` and run every stage, without events
    pub fn run(&self, root: &Path) -> Result<PipelineResult, DedupError> {
        self.run_with_events(root, &null_sender())
    }

    /// Scan `root` and run every stage with event reporting
    pub fn run_with_events(&self, root: &Path, events: &EventSender) -> Result<PipelineResult, DedupError> {
        let start_time = Instant::now();
        events.send(Event::Pipeline(PipelineEvent::Started));
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Discovering,
        }));

        let scanner = WalkDirScanner::new(self.scan_config.clone());
        let scan = scanner
            .scan_with_events(root, events)
            .map_err(|e| fail(events, e.into()))?;

        let checkpoint = self.checkpoint_manager(&scan.root);
        self.execute(scan.images, checkpoint, events, start_time)
    }

    /// Run every stage over paths discovered elsewhere.
    ///
    /// Paths are used as given. Without a configured store or path the
    /// checkpoint is kept in the current directory.
    pub fn run_paths(&self, paths: &[PathBuf], events: &EventSender) -> Result<PipelineResult, DedupError> {
        let start_time = Instant::now();
        events.send(Event::Pipeline(PipelineEvent::Started));

        let mut paths = paths.to_vec();
        paths.sort();
        paths.dedup();

        let checkpoint = self.checkpoint_manager(Path::new("."));
        self.execute(paths, checkpoint, events, start_time)
    }

    fn checkpoint_manager(&self, root: &Path) -> CheckpointManager {
        let config = self.config.checkpoint_config();
        match &self.store {
            Some(store) => CheckpointManager::new(Arc::clone(store), config),
            None => CheckpointManager::json(self.config.checkpoint_path_for(root), config),
        }
    }

    fn execute(
        &self,
        paths: Vec<PathBuf>,
        mut checkpoint: CheckpointManager,
        events: &EventSender,
        start_time: Instant,
    ) -> Result<PipelineResult, DedupError> {
        let mut state = self.restore(&paths, &mut checkpoint, events)?;

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Extracting,
        }));
        self.extract(&paths, &mut state, &mut checkpoint, events)?;

        // Stable input for bucketing regardless of extraction order
        state.records.sort_by(|a, b| a.path.cmp(&b.path));
        state.failures.sort_by(|a, b| a.path.cmp(&b.path));

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Comparing,
        }));
        let index = BucketIndex::build(&state.records);
        let bucket_stats = index.stats();
        let buckets: Vec<&[&ImageRecord]> = index.comparable().map(|(_, members)| members).collect();
        let comparisons = self.compare(&buckets, &bucket_stats, events);

        let matches: Vec<MatchResult> = buckets
            .iter()
            .zip(&comparisons)
            .flat_map(|(members, comparison)| comparison.edges.iter().map(move |e| e.to_match(members)))
            .collect();
        let comparisons_performed: u64 = comparisons.iter().map(|c| c.comparisons).sum();

        tracing::info!(
            "Performed {} comparisons ({} without bucketing, {:.1}% fewer), found {} similar pairs",
            comparisons_performed,
            bucket_stats.naive_comparisons,
            bucket_stats.reduction_percent(),
            matches.len()
        );

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Clustering,
        }));
        // One union-find per bucket; edges never cross buckets
        let clusters: Vec<Cluster<'_>> = buckets
            .par_iter()
            .zip(comparisons.par_iter())
            .flat_map_iter(|(members, comparison)| ClusterBuilder::new().build(members, &comparison.edges))
            .collect();

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Scoring,
        }));
        let groups = self.scorer.score_clusters(clusters);
        tracing::info!("Found {} duplicate groups", groups.len());

        // Only a finished run may discard progress
        let location = checkpoint.location();
        if checkpoint.clear().map_err(|e| fail(events, e.into()))? {
            events.send(Event::Checkpoint(CheckpointEvent::Cleared { path: location }));
        }

        let summary = PipelineSummary {
            total_images: paths.len(),
            resumed: state.resumed,
            extracted: state.extracted,
            failures: state.failures.len(),
            comparisons: comparisons_performed,
            naive_comparisons: bucket_stats.naive_comparisons,
            matches: matches.len(),
            duplicate_groups: groups.len(),
            duplicate_count: groups.iter().map(DuplicateGroup::duplicate_count).sum(),
            reclaimable_bytes: groups.iter().map(DuplicateGroup::reclaimable_bytes).sum(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: summary.clone(),
        }));

        Ok(PipelineResult {
            groups,
            failures: state.failures,
            matches,
            bucket_stats,
            summary,
        })
    }

    /// Load a compatible checkpoint, keeping only records still on the path list
    fn restore(
        &self,
        paths: &[PathBuf],
        checkpoint: &mut CheckpointManager,
        events: &EventSender,
    ) -> Result<ExtractionState, DedupError> {
        let mut state = ExtractionState::default();
        if !self.config.resume {
            return Ok(state);
        }

        let location = checkpoint.location();
        match checkpoint.resume().map_err(|e| fail(events, e.into()))? {
            ResumeOutcome::NotFound => {
                tracing::info!("No checkpoint to resume at {}", location.display());
            }
            ResumeOutcome::Rejected(mismatch) => {
                events.send(Event::Checkpoint(CheckpointEvent::Rejected {
                    path: location,
                    reason: mismatch.to_string(),
                }));
            }
            ResumeOutcome::Resumed(saved) => {
                let discovered: HashSet<&PathBuf> = paths.iter().collect();
                let stored = saved.records.len();

                state.records = saved
                    .records
                    .into_iter()
                    .filter(|r| discovered.contains(&r.path))
                    .collect();
                state.processed = saved
                    .processed
                    .into_iter()
                    .chain(state.records.iter().map(|r| r.path.clone()))
                    .filter(|p| discovered.contains(p))
                    .collect();
                state.resumed = state.records.len();

                if stored > state.records.len() {
                    tracing::info!(
                        "Dropped {} checkpoint records for files no longer present",
                        stored - state.records.len()
                    );
                }

                events.send(Event::Checkpoint(CheckpointEvent::Resumed {
                    path: location,
                    records: state.records.len(),
                    saved_at: saved.timestamp,
                }));
            }
        }

        Ok(state)
    }

    /// Extract every unprocessed path, saving a checkpoint after each interval.
    ///
    /// Records are extracted in parallel and applied to the shared state by
    /// this thread only, so a save never sees a half-applied image.
    fn extract(
        &self,
        paths: &[PathBuf],
        state: &mut ExtractionState,
        checkpoint: &mut CheckpointManager,
        events: &EventSender,
    ) -> Result<(), DedupError> {
        let pending: Vec<&PathBuf> = paths.iter().filter(|p| !state.processed.contains(*p)).collect();
        let total = paths.len();
        let already_processed = total - pending.len();

        tracing::info!(
            "Extracting {} images ({} already processed)",
            pending.len(),
            already_processed
        );
        events.send(Event::Extract(ExtractEvent::Started {
            total_images: total,
            already_processed,
        }));

        let interval = self.config.checkpoint_interval;
        let mut completed = already_processed;
        let mut unsaved = 0usize;
        let mut cancelled = false;
        let mut remaining: &[&PathBuf] = &pending;

        while !remaining.is_empty() {
            if self.cancellation.is_cancelled() {
                cancelled = true;
                break;
            }

            // Only extracted records count toward the interval, so a batch
            // never asks for more than the current interval still needs
            let (batch, rest) = remaining.split_at((interval - unsaved).min(remaining.len()));
            remaining = rest;

            let outcomes: Vec<(&PathBuf, Result<ImageRecord, ExtractionError>)> = batch
                .par_iter()
                .filter_map(|path| {
                    if self.cancellation.is_cancelled() {
                        return None;
                    }
                    Some((*path, self.extractor.extract(path)))
                })
                .collect();

            if outcomes.len() < batch.len() {
                cancelled = true;
            }

            for (path, outcome) in outcomes {
                completed += 1;
                match outcome {
                    Ok(record) => {
                        state.processed.insert(path.clone());
                        state.records.push(record);
                        state.extracted += 1;
                        unsaved += 1;
                    }
                    Err(error) => {
                        tracing::warn!("Skipping {}: {}", path.display(), error);
                        events.send(Event::Extract(ExtractEvent::Failed {
                            path: path.clone(),
                            reason: error.to_string(),
                        }));
                        state.failures.push(ExtractionFailure::new(path.clone(), &error));
                    }
                }

                events.send(Event::Extract(ExtractEvent::Progress(ExtractProgress {
                    completed,
                    total,
                    resumed: state.resumed,
                    failures: state.failures.len(),
                    current_path: path.clone(),
                })));
            }

            if cancelled {
                break;
            }

            // The last interval is covered by the flush below
            if unsaved == interval && !remaining.is_empty() {
                self.save(state, checkpoint, events)?;
                unsaved = 0;
            }
        }

        if unsaved > 0 {
            self.save(state, checkpoint, events)?;
        }

        if cancelled {
            tracing::warn!(
                "Run cancelled after {} of {} images; progress kept at {}",
                completed,
                total,
                checkpoint.location().display()
            );
            events.send(Event::Pipeline(PipelineEvent::Cancelled));
            return Err(DedupError::Cancelled);
        }

        tracing::info!(
            "Extracted {} images ({} resumed, {} failed)",
            state.extracted,
            state.resumed,
            state.failures.len()
        );
        events.send(Event::Extract(ExtractEvent::Completed {
            extracted: state.extracted,
            failed: state.failures.len(),
            resumed: state.resumed,
        }));

        Ok(())
    }

    fn save(
        &self,
        state: &ExtractionState,
        checkpoint: &mut CheckpointManager,
        events: &EventSender,
    ) -> Result<(), DedupError> {
        checkpoint
            .save(&state.records, &state.processed)
            .map_err(|e| fail(events, e.into()))?;

        events.send(Event::Checkpoint(CheckpointEvent::Saved {
            path: checkpoint.location(),
            records: state.records.len(),
        }));
        Ok(())
    }

    /// Compare every comparable bucket, buckets in parallel
    fn compare(
        &self,
        buckets: &[&[&ImageRecord]],
        stats: &BucketStats,
        events: &EventSender,
    ) -> Vec<BucketComparison> {
        tracing::info!(
            "Comparing {} records in {} buckets",
            stats.total_records,
            stats.buckets
        );
        events.send(Event::Compare(CompareEvent::Started {
            total_records: stats.total_records,
            buckets: stats.buckets,
            total_comparisons: stats.comparisons,
        }));

        let strategy = ThresholdStrategy::new(self.config.threshold);
        let comparator = BucketComparator::new(&strategy).with_refiner(self.refiner.as_deref());

        let buckets_completed = AtomicUsize::new(0);
        let comparisons_completed = AtomicU64::new(0);

        let comparisons: Vec<BucketComparison> = buckets
            .par_iter()
            .map(|members| {
                let comparison = comparator.compare_bucket(members);

                let done = buckets_completed.fetch_add(1, Ordering::SeqCst) + 1;
                let compared =
                    comparisons_completed.fetch_add(comparison.comparisons, Ordering::SeqCst) + comparison.comparisons;
                events.send(Event::Compare(CompareEvent::Progress(CompareProgress {
                    buckets_completed: done,
                    total_buckets: buckets.len(),
                    comparisons_completed: compared,
                    total_comparisons: stats.comparisons,
                })));

                comparison
            })
            .collect();

        let refined_out: usize = comparisons.iter().map(|c| c.refined_out).sum();
        if refined_out > 0 {
            tracing::info!("Structural refinement rejected {} candidate pairs", refined_out);
        }

        events.send(Event::Compare(CompareEvent::Completed {
            comparisons: comparisons.iter().map(|c| c.comparisons).sum(),
            matches: comparisons.iter().map(|c| c.edges.len()).sum(),
        }));

        comparisons
    }
}

/// Report a fatal error on the event stream and hand it back
fn fail(events: &EventSender, error: DedupError) -> DedupError {
    tracing::error!("{}", error);
    events.send(Event::Pipeline(PipelineEvent::Error {
        message: error.to_string(),
    }));
    error
}
