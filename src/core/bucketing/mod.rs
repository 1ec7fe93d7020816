//! # Bucketing Module
//!
//! Partitions records by a quantized, orientation-free aspect ratio so only
//! images of the same shape are ever compared.
//!
//! The key is `round((long side / short side) / 0.05)`: a 1920x1080 photo and
//! its 1080x1920 rotation share a bucket, while a 4:3 image lands elsewhere.
//! Records with a zero dimension share one degenerate bucket.
//!
//! Comparing within buckets costs `Σ size²` instead of `n²`. Images whose
//! shape changed through cropping are not found; that is accepted.

use crate::core::metadata::ImageRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Width of one aspect-ratio band
pub const BAND_WIDTH: f64 = 0.05;

/// Key of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BucketKey {
    /// Zero width or height
    Degenerate,
    /// Quantized long/short ratio band
    Band(i64),
}

impl BucketKey {
    /// Bucket for one record
    pub fn for_record(record: &ImageRecord) -> Self {
        match record.orientation_free_ratio() {
            Some(ratio) => BucketKey::Band((ratio / BAND_WIDTH).round() as i64),
            None => BucketKey::Degenerate,
        }
    }

    /// Center ratio of the band, if any
    pub fn ratio(&self) -> Option<f64> {
        match self {
            BucketKey::Degenerate => None,
            BucketKey::Band(band) => Some(*band as f64 * BAND_WIDTH),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ratio() {
            Some(ratio) => write!(f, "{:.2}", ratio),
            None => write!(f, "degenerate"),
        }
    }
}

/// Records grouped by bucket, in a deterministic key order.
///
/// Members keep the order of the record slice they were built from.
#[derive(Debug)]
pub struct BucketIndex<'a> {
    buckets: BTreeMap<BucketKey, Vec<&'a ImageRecord>>,
}

impl<'a> BucketIndex<'a> {
    /// Assign every record to exactly one bucket
    pub fn build(records: &'a [ImageRecord]) -> Self {
        let mut buckets: BTreeMap<BucketKey, Vec<&'a ImageRecord>> = BTreeMap::new();
        for record in records {
            buckets
                .entry(BucketKey::for_record(record))
                .or_default()
                .push(record);
        }
        Self { buckets }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Buckets in key order
    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &[&'a ImageRecord])> + '_ {
        self.buckets.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Buckets holding at least two records; the only ones worth comparing
    pub fn comparable(&self) -> impl Iterator<Item = (&BucketKey, &[&'a ImageRecord])> + '_ {
        self.iter().filter(|(_, members)| members.len() >= 2)
    }

    /// Pairwise comparisons this partition requires
    pub fn stats(&self) -> BucketStats {
        let total_records: usize = self.buckets.values().map(Vec::len).sum();
        let comparisons: u64 = self
            .buckets
            .values()
            .map(|members| pair_count(members.len()))
            .sum();

        BucketStats {
            buckets: self.buckets.len(),
            total_records,
            comparisons,
            naive_comparisons: pair_count(total_records),
        }
    }
}

/// Comparison-space reduction achieved by bucketing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub buckets: usize,
    pub total_records: usize,
    /// Σ n(n-1)/2 over buckets
    pub comparisons: u64,
    /// n(n-1)/2 over all records
    pub naive_comparisons: u64,
}

impl BucketStats {
    /// Share of naive comparisons avoided, 0-100
    pub fn reduction_percent(&self) -> f64 {
        if self.naive_comparisons == 0 {
            return 0.0;
        }
        (1.0 - self.comparisons as f64 / self.naive_comparisons as f64) * 100.0
    }
}

fn pair_count(n: usize) -> u64 {
    let n = n as u64;
    n * n.saturating_sub(1) / 2
}
