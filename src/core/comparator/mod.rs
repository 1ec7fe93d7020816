//! # Comparator Module
//!
//! Decides which pairs inside one bucket are duplicates.
//!
//! ## How It Works
//! 1. For each pair, take the minimum Hamming distance over all 4x4
//!    combinations of the two records' rotation fingerprints
//! 2. Apply the comparison strategy (distance <= threshold) to get a
//!    candidate edge
//! 3. Optionally confirm candidates with structural similarity at the
//!    best-matching rotation; refinement never adds edges
//!
//! Edges refer to members by their index in the bucket slice, which is
//! what the cluster builder consumes.

mod ssim;
mod traits;

pub use ssim::{structural_similarity, SsimRefiner};
pub use traits::{ComparisonStrategy, StructuralRefiner, ThresholdStrategy};

use crate::core::fingerprint::{RotatedFingerprints, Rotation};
use crate::core::metadata::ImageRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Rotations of record A and record B that produced a distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPair {
    pub a: Rotation,
    pub b: Rotation,
}

impl RotationPair {
    /// Rotation that turns B's content to line up with unrotated A
    pub fn offset(&self) -> Rotation {
        self.a.offset_to(self.b)
    }
}

/// Minimum distance between two fingerprint sets, and the rotations achieving it.
///
/// Rotations are tried in order and the first minimum wins, so the pair
/// reported is deterministic; it is diagnostic only.
pub fn min_rotation_distance(
    a: &RotatedFingerprints,
    b: &RotatedFingerprints,
) -> (u32, RotationPair) {
    let mut best = (
        u32::MAX,
        RotationPair {
            a: Rotation::R0,
            b: Rotation::R0,
        },
    );

    for (ra, fa) in a.iter() {
        for (rb, fb) in b.iter() {
            let distance = fa.distance(fb);
            if distance < best.0 {
                best = (distance, RotationPair { a: ra, b: rb });
                if distance == 0 {
                    return best;
                }
            }
        }
    }

    best
}

/// A confirmed duplicate edge between two members of one bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateEdge {
    /// Index of the first member in the bucket slice
    pub a: usize,
    /// Index of the second member (always greater than `a`)
    pub b: usize,
    /// Minimum fingerprint distance
    pub distance: u32,
    pub rotation: RotationPair,
    /// Structural similarity, when refinement ran
    pub structural_similarity: Option<f64>,
}

/// Result of comparing two images, by path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub image_a: PathBuf,
    pub image_b: PathBuf,
    pub distance: u32,
    pub rotation: RotationPair,
    pub structural_similarity: Option<f64>,
}

/// Edges found in one bucket, with the work done to find them
#[derive(Debug, Clone, Default)]
pub struct BucketComparison {
    pub edges: Vec<DuplicateEdge>,
    /// Pairs whose fingerprints were compared
    pub comparisons: u64,
    /// Candidates dropped by structural refinement
    pub refined_out: usize,
}

/// Compares members of one bucket against each other
pub struct BucketComparator<'a> {
    strategy: &'a dyn ComparisonStrategy,
    refiner: Option<&'a dyn StructuralRefiner>,
}

impl<'a> BucketComparator<'a> {
    pub fn new(strategy: &'a dyn ComparisonStrategy) -> Self {
        Self {
            strategy,
            refiner: None,
        }
    }

    /// Confirm candidate edges with a structural refiner
    pub fn with_refiner(mut self, refiner: Option<&'a dyn StructuralRefiner>) -> Self {
        self.refiner = refiner;
        self
    }

    /// Compare one pair; Some(edge) when it is a confirmed duplicate
    pub fn compare_pair(
        &self,
        (ia, a): (usize, &ImageRecord),
        (ib, b): (usize, &ImageRecord),
    ) -> PairOutcome {
        let (distance, rotation) = min_rotation_distance(&a.fingerprints, &b.fingerprints);

        if !self.strategy.is_duplicate(distance) {
            return PairOutcome::Distinct;
        }

        let structural_similarity = match self.refiner {
            None => None,
            Some(refiner) => match refiner.score(&a.path, &b.path, rotation.offset()) {
                Ok(score) if score >= refiner.min_score() => Some(score),
                Ok(score) => {
                    debug!(
                        "Structural similarity {:.4} below {:.4}: {} / {}",
                        score,
                        refiner.min_score(),
                        a.path.display(),
                        b.path.display()
                    );
                    return PairOutcome::RefinedOut;
                }
                Err(e) => {
                    warn!("Structural similarity failed, rejecting edge: {}", e);
                    return PairOutcome::RefinedOut;
                }
            },
        };

        PairOutcome::Edge(DuplicateEdge {
            a: ia,
            b: ib,
            distance,
            rotation,
            structural_similarity,
        })
    }

    /// Compare every pair of members
    pub fn compare_bucket(&self, members: &[&ImageRecord]) -> BucketComparison {
        let mut result = BucketComparison::default();

        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                result.comparisons += 1;
                match self.compare_pair((i, members[i]), (j, members[j])) {
                    PairOutcome::Edge(edge) => result.edges.push(edge),
                    PairOutcome::RefinedOut => result.refined_out += 1,
                    PairOutcome::Distinct => {}
                }
            }
        }

        result
    }
}

/// Outcome of comparing one pair
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    /// Confirmed duplicate
    Edge(DuplicateEdge),
    /// Within threshold but rejected by structural refinement
    RefinedOut,
    /// Above threshold
    Distinct,
}

impl DuplicateEdge {
    /// Resolve member indices to paths
    pub fn to_match(&self, members: &[&ImageRecord]) -> MatchResult {
        MatchResult {
            image_a: members[self.a].path.clone(),
            image_b: members[self.b].path.clone(),
            distance: self.distance,
            rotation: self.rotation,
            structural_similarity: self.structural_similarity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::Fingerprint;
    use crate::core::metadata::ImageFormat;
    use crate::error::ExtractionError;
    use std::path::Path;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes(vec![byte; 8])
    }

    fn record(name: &str, hashes: [u8; 4]) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(format!("/photos/{}", name)),
            width: 1920,
            height: 1080,
            file_size: 1000,
            format: ImageFormat::Jpeg,
            bit_depth: Some(8),
            has_exif: false,
            fingerprints: RotatedFingerprints {
                r0: fp(hashes[0]),
                r90: fp(hashes[1]),
                r180: fp(hashes[2]),
                r270: fp(hashes[3]),
            },
        }
    }

    struct FixedRefiner {
        score: Result<f64, ()>,
    }

    impl StructuralRefiner for FixedRefiner {
        fn score(&self, a: &Path, _b: &Path, _offset: Rotation) -> Result<f64, ExtractionError> {
            self.score.map_err(|_| ExtractionError::Decode {
                path: a.to_path_buf(),
                reason: "unreadable".into(),
            })
        }

        fn min_score(&self) -> f64 {
            0.9
        }
    }

    #[test]
    fn min_distance_considers_all_rotation_pairs() {
        // B's 90° variant equals A's original
        let a = record("a.jpg", [0x0F, 0x33, 0x55, 0x77]);
        let b = record("b.jpg", [0xF0, 0x0F, 0xAA, 0xCC]);

        let (distance, pair) = min_rotation_distance(&a.fingerprints, &b.fingerprints);
        assert_eq!(distance, 0);
        assert_eq!(pair, RotationPair { a: Rotation::R0, b: Rotation::R90 });
        assert_eq!(pair.offset(), Rotation::R90);
    }

    #[test]
    fn identical_records_have_zero_distance_at_r0() {
        let a = record("a.jpg", [1, 2, 3, 4]);
        let (distance, pair) = min_rotation_distance(&a.fingerprints, &a.fingerprints);
        assert_eq!(distance, 0);
        assert_eq!(pair.a, Rotation::R0);
        assert_eq!(pair.b, Rotation::R0);
    }

    #[test]
    fn compare_bucket_counts_all_pairs() {
        let strategy = ThresholdStrategy::new(5);
        let records = vec![
            record("a.jpg", [0xFF; 4]),
            record("b.jpg", [0xFF; 4]),
            record("c.jpg", [0x00; 4]),
        ];
        let members: Vec<&ImageRecord> = records.iter().collect();

        let result = BucketComparator::new(&strategy).compare_bucket(&members);

        assert_eq!(result.comparisons, 3);
        assert_eq!(result.edges.len(), 1);
        assert_eq!((result.edges[0].a, result.edges[0].b), (0, 1));
        assert_eq!(result.edges[0].structural_similarity, None);
    }

    #[test]
    fn threshold_is_inclusive() {
        // 0x0F vs 0x1F differs in one bit per byte: 8 bits over 8 bytes
        let strategy = ThresholdStrategy::new(8);
        let a = record("a.jpg", [0x0F; 4]);
        let b = record("b.jpg", [0x1F; 4]);

        let comparator = BucketComparator::new(&strategy);
        assert!(matches!(comparator.compare_pair((0, &a), (1, &b)), PairOutcome::Edge(_)));

        let strict = ThresholdStrategy::new(7);
        let comparator = BucketComparator::new(&strict);
        assert_eq!(comparator.compare_pair((0, &a), (1, &b)), PairOutcome::Distinct);
    }

    #[test]
    fn refiner_only_filters() {
        let strategy = ThresholdStrategy::new(5);
        let records = vec![
            record("a.jpg", [0xFF; 4]),
            record("b.jpg", [0xFF; 4]),
            record("c.jpg", [0x00; 4]),
        ];
        let members: Vec<&ImageRecord> = records.iter().collect();

        let accepting = FixedRefiner { score: Ok(0.97) };
        let result = BucketComparator::new(&strategy)
            .with_refiner(Some(&accepting))
            .compare_bucket(&members);
        assert_eq!(result.edges.len(), 1);
        assert_eq!(result.edges[0].structural_similarity, Some(0.97));

        let rejecting = FixedRefiner { score: Ok(0.5) };
        let result = BucketComparator::new(&strategy)
            .with_refiner(Some(&rejecting))
            .compare_bucket(&members);
        assert!(result.edges.is_empty());
        assert_eq!(result.refined_out, 1);
    }

    #[test]
    fn refinement_failure_rejects_edge() {
        let strategy = ThresholdStrategy::new(5);
        let a = record("a.jpg", [0xFF; 4]);
        let b = record("b.jpg", [0xFF; 4]);
        let failing = FixedRefiner { score: Err(()) };

        let comparator = BucketComparator::new(&strategy).with_refiner(Some(&failing));
        assert_eq!(comparator.compare_pair((0, &a), (1, &b)), PairOutcome::RefinedOut);
    }

    #[test]
    fn edges_resolve_to_paths() {
        let strategy = ThresholdStrategy::new(5);
        let records = vec![record("a.jpg", [0xFF; 4]), record("b.jpg", [0xFF; 4])];
        let members: Vec<&ImageRecord> = records.iter().collect();

        let result = BucketComparator::new(&strategy).compare_bucket(&members);
        let matched = result.edges[0].to_match(&members);
        assert_eq!(matched.image_a, PathBuf::from("/photos/a.jpg"));
        assert_eq!(matched.image_b, PathBuf::from("/photos/b.jpg"));
    }
}
