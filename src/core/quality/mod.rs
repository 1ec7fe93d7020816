//! # Quality Module
//!
//! Scores the members of each duplicate group and picks the one to keep.
//!
//! ## Scoring
//! | Component  | Weight | Value |
//! |------------|--------|-------|
//! | Resolution | 0.45   | pixel count, normalized to the group maximum (0-100) |
//! | File size  | 0.15   | bytes, normalized to the group maximum (0-100) |
//! | EXIF       | 0.15   | 100 if present, else 0 |
//! | Format     | 0.15   | 100 if lossless, else 50 |
//! | Bit depth  | 0.10   | bits per pixel, normalized to the group maximum (0-100) |
//!
//! Scores are rounded to two decimals. The keeper is the highest score;
//! ties go to the larger file, then to the lexicographically smallest path.
//!
//! Scoring only annotates. Nothing here touches the filesystem.

use crate::core::cluster::Cluster;
use crate::core::metadata::ImageRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Fixed weighting of the quality components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub resolution: f64,
    pub file_size: f64,
    pub exif: f64,
    pub format: f64,
    pub bit_depth: f64,
}

impl QualityWeights {
    pub const DEFAULT: QualityWeights = QualityWeights {
        resolution: 0.45,
        file_size: 0.15,
        exif: 0.15,
        format: 0.15,
        bit_depth: 0.10,
    };
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Group-wide maxima used to normalize components
#[derive(Debug, Clone, Copy, Default)]
struct GroupMaxima {
    resolution: u64,
    file_size: u64,
    bit_depth: u32,
}

impl GroupMaxima {
    fn of<'a>(records: impl IntoIterator<Item = &'a ImageRecord>) -> Self {
        records
            .into_iter()
            .fold(GroupMaxima::default(), |max, record| GroupMaxima {
                resolution: max.resolution.max(record.resolution()),
                file_size: max.file_size.max(record.file_size),
                bit_depth: max.bit_depth.max(record.bit_depth.unwrap_or(0)),
            })
    }
}

fn normalized(value: u64, max: u64) -> f64 {
    if max == 0 {
        0.0
    } else {
        value as f64 / max as f64 * 100.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A group member with its score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMember {
    pub record: ImageRecord,
    pub quality_score: f64,
    pub is_keeper: bool,
}

/// A scored group of duplicates with exactly one keeper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Position of the group in the run's output
    pub group_id: usize,
    /// Members sorted by path
    pub members: Vec<ScoredMember>,
    /// Mean fingerprint distance over the group's edges
    pub average_distance: f64,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The member recommended for keeping
    pub fn keeper(&self) -> Option<&ScoredMember> {
        self.members.iter().find(|m| m.is_keeper)
    }

    /// Every member except the keeper
    pub fn duplicates(&self) -> impl Iterator<Item = &ScoredMember> {
        self.members.iter().filter(|m| !m.is_keeper)
    }

    /// Number of duplicates (excluding the keeper)
    pub fn duplicate_count(&self) -> usize {
        self.members.len().saturating_sub(1)
    }

    /// Bytes freed by removing every duplicate
    pub fn reclaimable_bytes(&self) -> u64 {
        self.duplicates().map(|m| m.record.file_size).sum()
    }
}

/// Assigns quality scores and keepers
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    weights: QualityWeights,
}

impl QualityScorer {
    pub fn new(weights: QualityWeights) -> Self {
        Self { weights }
    }

    /// Score one record against the maxima of its group
    fn score_with(&self, record: &ImageRecord, max: &GroupMaxima) -> f64 {
        let w = &self.weights;
        let resolution = normalized(record.resolution(), max.resolution);
        let file_size = normalized(record.file_size, max.file_size);
        let exif = if record.has_exif { 100.0 } else { 0.0 };
        let format = if record.is_lossless() { 100.0 } else { 50.0 };
        let bit_depth = normalized(
            record.bit_depth.unwrap_or(0) as u64,
            max.bit_depth as u64,
        );

        round2(
            resolution * w.resolution
                + file_size * w.file_size
                + exif * w.exif
                + format * w.format
                + bit_depth * w.bit_depth,
        )
    }

    /// Score every member of `records` relative to each other
    pub fn score_all(&self, records: &[&ImageRecord]) -> Vec<f64> {
        let max = GroupMaxima::of(records.iter().copied());
        records.iter().map(|r| self.score_with(r, &max)).collect()
    }

    /// Score a cluster and mark its keeper
    pub fn score_cluster(&self, group_id: usize, cluster: &Cluster<'_>) -> DuplicateGroup {
        let scores = self.score_all(&cluster.members);

        let mut members: Vec<ScoredMember> = cluster
            .members
            .iter()
            .zip(scores)
            .map(|(record, quality_score)| ScoredMember {
                record: (*record).clone(),
                quality_score,
                is_keeper: false,
            })
            .collect();

        if let Some(keeper) = (0..members.len()).min_by(|&a, &b| keeper_order(&members[a], &members[b])) {
            members[keeper].is_keeper = true;
        }

        DuplicateGroup {
            group_id,
            members,
            average_distance: cluster.average_distance,
        }
    }

    /// Score clusters into groups ordered by their first path, numbered from zero
    pub fn score_clusters(&self, mut clusters: Vec<Cluster<'_>>) -> Vec<DuplicateGroup> {
        clusters.sort_by(|a, b| a.members[0].path.cmp(&b.members[0].path));
        clusters
            .iter()
            .enumerate()
            .map(|(group_id, cluster)| self.score_cluster(group_id, cluster))
            .collect()
    }
}

/// Best keeper candidate first
fn keeper_order(a: &ScoredMember, b: &ScoredMember) -> Ordering {
    b.quality_score
        .total_cmp(&a.quality_score)
        .then_with(|| b.record.file_size.cmp(&a.record.file_size))
        .then_with(|| a.record.path.cmp(&b.record.path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::{Fingerprint, RotatedFingerprints};
    use crate::core::metadata::ImageFormat;
    use std::path::PathBuf;

    fn record(name: &str, width: u32, height: u32, file_size: u64, format: ImageFormat) -> ImageRecord {
        let fp = Fingerprint::from_bytes(vec![0; 8]);
        ImageRecord {
            path: PathBuf::from(format!("/photos/{}", name)),
            width,
            height,
            file_size,
            format,
            bit_depth: Some(8),
            has_exif: false,
            fingerprints: RotatedFingerprints {
                r0: fp.clone(),
                r90: fp.clone(),
                r180: fp.clone(),
                r270: fp,
            },
        }
    }

    fn cluster<'a>(members: Vec<&'a ImageRecord>) -> Cluster<'a> {
        Cluster {
            members,
            edge_count: 1,
            average_distance: 2.0,
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let w = QualityWeights::DEFAULT;
        let total = w.resolution + w.file_size + w.exif + w.format + w.bit_depth;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn best_in_every_component_scores_hundred() {
        let mut best = record("a.png", 1000, 1000, 5000, ImageFormat::Png);
        best.has_exif = true;
        let worse = record("b.jpg", 500, 500, 1000, ImageFormat::Jpeg);

        let scores = QualityScorer::default().score_all(&[&best, &worse]);
        assert_eq!(scores[0], 100.0);
        // 25*0.45 + 20*0.15 + 0 + 50*0.15 + 100*0.10
        assert_eq!(scores[1], 31.75);
    }

    #[test]
    fn higher_resolution_wins() {
        let large = record("b.jpg", 4000, 3000, 2_000_000, ImageFormat::Jpeg);
        let small = record("a.jpg", 1600, 1200, 2_000_000, ImageFormat::Jpeg);

        let group = QualityScorer::default().score_cluster(0, &cluster(vec![&small, &large]));
        assert_eq!(group.keeper().unwrap().record.path, PathBuf::from("/photos/b.jpg"));
    }

    #[test]
    fn lossless_beats_lossy_at_equal_size() {
        let png = record("b.png", 1000, 1000, 1000, ImageFormat::Png);
        let jpg = record("a.jpg", 1000, 1000, 1000, ImageFormat::Jpeg);

        let group = QualityScorer::default().score_cluster(0, &cluster(vec![&jpg, &png]));
        assert!(group.keeper().unwrap().record.is_lossless());
    }

    #[test]
    fn ties_break_by_file_size_then_path() {
        // Identical scores once rounded: the size gap is worth 0.0015 points
        let a = record("a.jpg", 1000, 1000, 99_999, ImageFormat::Jpeg);
        let b = record("b.jpg", 1000, 1000, 100_000, ImageFormat::Jpeg);
        let scores = QualityScorer::default().score_all(&[&a, &b]);
        assert_eq!(scores[0], scores[1]);

        let group = QualityScorer::default().score_cluster(0, &cluster(vec![&a, &b]));
        assert_eq!(group.keeper().unwrap().record.path, PathBuf::from("/photos/b.jpg"));

        let c = record("c.jpg", 1000, 1000, 100_000, ImageFormat::Jpeg);
        let group = QualityScorer::default().score_cluster(0, &cluster(vec![&c, &b]));
        assert_eq!(group.keeper().unwrap().record.path, PathBuf::from("/photos/b.jpg"));
    }

    #[test]
    fn exactly_one_keeper_and_reclaimable_bytes() {
        let a = record("a.jpg", 100, 100, 300, ImageFormat::Jpeg);
        let b = record("b.jpg", 100, 100, 200, ImageFormat::Jpeg);
        let c = record("c.jpg", 100, 100, 100, ImageFormat::Jpeg);

        let group = QualityScorer::default().score_cluster(3, &cluster(vec![&a, &b, &c]));
        assert_eq!(group.group_id, 3);
        assert_eq!(group.members.iter().filter(|m| m.is_keeper).count(), 1);
        assert_eq!(group.duplicate_count(), 2);
        assert_eq!(group.reclaimable_bytes(), 300);
    }

    #[test]
    fn groups_are_numbered_by_first_path() {
        let a = record("a.jpg", 100, 100, 100, ImageFormat::Jpeg);
        let b = record("b.jpg", 100, 100, 100, ImageFormat::Jpeg);
        let c = record("c.jpg", 100, 100, 100, ImageFormat::Jpeg);
        let d = record("d.jpg", 100, 100, 100, ImageFormat::Jpeg);

        let groups = QualityScorer::default()
            .score_clusters(vec![cluster(vec![&c, &d]), cluster(vec![&a, &b])]);

        assert_eq!(groups[0].group_id, 0);
        assert_eq!(groups[0].members[0].record.path, PathBuf::from("/photos/a.jpg"));
        assert_eq!(groups[1].members[0].record.path, PathBuf::from("/photos/c.jpg"));
    }

    #[test]
    fn missing_bit_depth_scores_zero_for_that_component() {
        let mut a = record("a.png", 100, 100, 100, ImageFormat::Png);
        a.bit_depth = None;
        let b = record("b.png", 100, 100, 100, ImageFormat::Png);

        let scores = QualityScorer::default().score_all(&[&a, &b]);
        assert_eq!(scores[1] - scores[0], 10.0);
    }
}
