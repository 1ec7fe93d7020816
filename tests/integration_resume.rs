//! Integration tests for interrupted and resumed runs.
//!
//! A synthetic extractor stands in for image decoding so that interruption
//! points and per-path extraction counts are exact.

use assert_fs::prelude::*;
use image_dedup::core::checkpoint::{CheckpointStore, SqliteStore};
use image_dedup::core::fingerprint::{Fingerprint, RecordExtractor, RotatedFingerprints};
use image_dedup::core::metadata::{ImageFormat, ImageRecord};
use image_dedup::core::pipeline::{CancellationToken, Pipeline, PipelineResult};
use image_dedup::error::{DedupError, ExtractionError};
use image_dedup::events::null_sender;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn splitmix(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_4761_CE4E_5B9D);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn record(path: &Path, fingerprint: Fingerprint, file_size: u64) -> ImageRecord {
    ImageRecord {
        path: path.to_path_buf(),
        width: 1920,
        height: 1080,
        file_size,
        format: ImageFormat::Jpeg,
        bit_depth: Some(8),
        has_exif: false,
        fingerprints: RotatedFingerprints {
            r0: fingerprint.clone(),
            r90: fingerprint.clone(),
            r180: fingerprint.clone(),
            r270: fingerprint,
        },
    }
}

/// `img_NNN.jpg` files come in pairs sharing one fingerprint.
///
/// Cancels `token` once `stop_after` extractions have finished.
struct PairedExtractor {
    calls: Mutex<Vec<PathBuf>>,
    count: AtomicUsize,
    stop_after: Option<(usize, CancellationToken)>,
}

impl PairedExtractor {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
            stop_after: None,
        }
    }

    fn stopping_after(limit: usize, token: CancellationToken) -> Self {
        Self {
            stop_after: Some((limit, token)),
            ..Self::new()
        }
    }

    fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl RecordExtractor for PairedExtractor {
    fn extract(&self, path: &Path) -> Result<ImageRecord, ExtractionError> {
        self.calls.lock().unwrap().push(path.to_path_buf());

        let stem = path.file_stem().unwrap().to_string_lossy();
        let index: u64 = stem.trim_start_matches("img_").parse().unwrap();
        let hash = splitmix(index / 2);
        let result = record(path, Fingerprint::from_bytes(hash.to_be_bytes().to_vec()), 1_000 + index);

        let done = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.stop_after {
            if done >= *limit {
                token.cancel();
            }
        }
        Ok(result)
    }

    fn hash_size(&self) -> u32 {
        8
    }
}

fn batch(count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| PathBuf::from(format!("/batch/img_{:03}.jpg", i)))
        .collect()
}

/// Run on a single worker so the extraction order within a chunk is the path order
fn run_single_threaded(pipeline: &Pipeline, paths: &[PathBuf]) -> Result<PipelineResult, DedupError> {
    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    pool.install(|| pipeline.run_paths(paths, &null_sender()))
}

fn group_shape(result: &PipelineResult) -> Vec<(Vec<PathBuf>, PathBuf, Vec<f64>)> {
    result
        .groups
        .iter()
        .map(|g| {
            (
                g.members.iter().map(|m| m.record.path.clone()).collect(),
                g.keeper().unwrap().record.path.clone(),
                g.members.iter().map(|m| m.quality_score).collect(),
            )
        })
        .collect()
}

fn checkpoint_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[test]
fn interrupted_run_resumes_without_reextracting() {
    let temp = assert_fs::TempDir::new().unwrap();
    let checkpoint = temp.child("progress.json");
    let paths = batch(250);

    let token = CancellationToken::new();
    let interrupted = Arc::new(PairedExtractor::stopping_after(150, token.clone()));
    let pipeline = Pipeline::builder()
        .checkpoint_interval(100)
        .checkpoint_path(checkpoint.path())
        .extractor(interrupted.clone())
        .cancellation(token)
        .build()
        .unwrap();

    let result = run_single_threaded(&pipeline, &paths);
    assert!(matches!(result, Err(DedupError::Cancelled)));
    assert_eq!(interrupted.calls().len(), 150);

    checkpoint.assert(predicate::path::exists());
    let saved = checkpoint_json(checkpoint.path());
    assert_eq!(saved["processed_files"].as_array().unwrap().len(), 150);
    assert_eq!(saved["image_metadata"].as_array().unwrap().len(), 150);
    assert_eq!(saved["config"]["threshold"], 10);

    let resumed_extractor = Arc::new(PairedExtractor::new());
    let pipeline = Pipeline::builder()
        .checkpoint_interval(100)
        .checkpoint_path(checkpoint.path())
        .resume(true)
        .extractor(resumed_extractor.clone())
        .build()
        .unwrap();

    let result = run_single_threaded(&pipeline, &paths).unwrap();

    let calls = resumed_extractor.calls();
    assert_eq!(calls.len(), 100);
    assert!(calls.iter().all(|p| !paths[..150].contains(p)));
    assert_eq!(result.summary.resumed, 150);
    assert_eq!(result.summary.extracted, 100);
    assert_eq!(result.groups.len(), 125);
    checkpoint.assert(predicate::path::missing());
}

#[test]
fn resumed_run_matches_uninterrupted_run() {
    let temp = assert_fs::TempDir::new().unwrap();
    let paths = batch(40);

    let straight = Pipeline::builder()
        .checkpoint_interval(7)
        .checkpoint_path(temp.child("straight.json").path())
        .extractor(Arc::new(PairedExtractor::new()))
        .build()
        .unwrap();
    let expected = run_single_threaded(&straight, &paths).unwrap();

    let checkpoint = temp.child("interrupted.json");
    let token = CancellationToken::new();
    let first = Pipeline::builder()
        .checkpoint_interval(7)
        .checkpoint_path(checkpoint.path())
        .extractor(Arc::new(PairedExtractor::stopping_after(17, token.clone())))
        .cancellation(token)
        .build()
        .unwrap();
    assert!(run_single_threaded(&first, &paths).is_err());

    let second = Pipeline::builder()
        .checkpoint_interval(7)
        .checkpoint_path(checkpoint.path())
        .resume(true)
        .extractor(Arc::new(PairedExtractor::new()))
        .build()
        .unwrap();
    let resumed = run_single_threaded(&second, &paths).unwrap();

    assert_eq!(resumed.summary.resumed, 17);
    assert_eq!(group_shape(&expected), group_shape(&resumed));
    assert_eq!(expected.groups.len(), 20);
}

#[test]
fn mismatched_settings_discard_the_checkpoint() {
    let temp = assert_fs::TempDir::new().unwrap();
    let checkpoint = temp.child("progress.json");
    let paths = batch(30);

    let token = CancellationToken::new();
    let first = Pipeline::builder()
        .threshold(10)
        .checkpoint_interval(5)
        .checkpoint_path(checkpoint.path())
        .extractor(Arc::new(PairedExtractor::stopping_after(12, token.clone())))
        .cancellation(token)
        .build()
        .unwrap();
    assert!(run_single_threaded(&first, &paths).is_err());
    checkpoint.assert(predicate::path::exists());

    let extractor = Arc::new(PairedExtractor::new());
    let second = Pipeline::builder()
        .threshold(12)
        .checkpoint_interval(5)
        .checkpoint_path(checkpoint.path())
        .resume(true)
        .extractor(extractor.clone())
        .build()
        .unwrap();
    let result = run_single_threaded(&second, &paths).unwrap();

    assert_eq!(extractor.calls().len(), 30);
    assert_eq!(result.summary.resumed, 0);
    checkpoint.assert(predicate::path::missing());
}

#[test]
fn sqlite_store_survives_interruption() {
    let temp = assert_fs::TempDir::new().unwrap();
    let db = temp.child("state").child("checkpoints.db");
    let paths = batch(20);

    let store: Arc<dyn CheckpointStore> = Arc::new(SqliteStore::open(db.path(), "/batch").unwrap());

    let token = CancellationToken::new();
    let first = Pipeline::builder()
        .checkpoint_interval(4)
        .checkpoint_store(Arc::clone(&store))
        .extractor(Arc::new(PairedExtractor::stopping_after(9, token.clone())))
        .cancellation(token)
        .build()
        .unwrap();
    assert!(run_single_threaded(&first, &paths).is_err());
    db.assert(predicate::path::exists());
    assert!(store.read().unwrap().is_some());

    let extractor = Arc::new(PairedExtractor::new());
    let second = Pipeline::builder()
        .checkpoint_interval(4)
        .checkpoint_store(Arc::clone(&store))
        .resume(true)
        .extractor(extractor.clone())
        .build()
        .unwrap();
    let result = run_single_threaded(&second, &paths).unwrap();

    assert_eq!(extractor.calls().len(), 11);
    assert_eq!(result.groups.len(), 10);
    assert!(store.read().unwrap().is_none());
}

/// Fingerprints on a chain: each neighbour is 6 bits away, the ends 12 apart
struct ChainExtractor;

impl RecordExtractor for ChainExtractor {
    fn extract(&self, path: &Path) -> Result<ImageRecord, ExtractionError> {
        let hash: u64 = match path.file_name().unwrap().to_str().unwrap() {
            "a.jpg" => 0,
            "b.jpg" => 0b11_1111,
            "c.jpg" => 0b1111_1111_1111,
            _ => u64::MAX,
        };
        Ok(record(path, Fingerprint::from_bytes(hash.to_be_bytes().to_vec()), 5_000))
    }

    fn hash_size(&self) -> u32 {
        8
    }
}

#[test]
fn groups_are_transitive_across_distant_ends() {
    let temp = assert_fs::TempDir::new().unwrap();
    let paths: Vec<PathBuf> = ["a.jpg", "b.jpg", "c.jpg", "z.jpg"]
        .iter()
        .map(|name| PathBuf::from("/chain").join(name))
        .collect();

    let pipeline = Pipeline::builder()
        .threshold(10)
        .checkpoint_path(temp.child("chain.json").path())
        .extractor(Arc::new(ChainExtractor))
        .build()
        .unwrap();
    let result = pipeline.run_paths(&paths, &null_sender()).unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 3);
    // a and c are never compared within threshold, only linked through b
    assert_eq!(result.matches.len(), 2);
    assert!(result
        .matches
        .iter()
        .all(|m| m.image_a.ends_with("b.jpg") || m.image_b.ends_with("b.jpg")));
}
