//! Trait definitions for comparison strategies and edge refinement.

use crate::core::fingerprint::Rotation;
use crate::error::ExtractionError;
use std::path::Path;

/// Strategy trait for deciding whether a fingerprint distance is a duplicate
pub trait ComparisonStrategy: Send + Sync {
    /// Determine if two images are candidate duplicates based on distance
    fn is_duplicate(&self, distance: u32) -> bool;

    /// Get the threshold used
    fn threshold(&self) -> u32;

    /// Human-readable description of the strategy
    fn description(&self) -> String;
}

/// Simple threshold-based comparison strategy
#[derive(Debug, Clone)]
pub struct ThresholdStrategy {
    /// Maximum distance to consider as duplicate
    threshold: u32,
}

impl ThresholdStrategy {
    /// Create a new threshold strategy
    ///
    /// Thresholds are in bits, so they only mean something relative to the
    /// hash size. At hash size 8 (64 bits):
    /// - 5: Conservative, few false positives
    /// - 10: Default
    /// - 15: Permissive, catches heavier edits
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }
}

impl Default for ThresholdStrategy {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ComparisonStrategy for ThresholdStrategy {
    fn is_duplicate(&self, distance: u32) -> bool {
        distance <= self.threshold
    }

    fn threshold(&self) -> u32 {
        self.threshold
    }

    fn description(&self) -> String {
        format!(
            "Threshold strategy: images with distance <= {} are considered duplicates",
            self.threshold
        )
    }
}

/// Second-stage check applied to edges that already passed the hash threshold.
///
/// A refiner only ever removes edges.
pub trait StructuralRefiner: Send + Sync {
    /// Similarity of two images once `b` is turned by `offset` to line up with `a`
    fn score(&self, a: &Path, b: &Path, offset: Rotation) -> Result<f64, ExtractionError>;

    /// Minimum score for an edge to be confirmed
    fn min_score(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_strategy_at_boundary() {
        let strategy = ThresholdStrategy::new(5);

        assert!(strategy.is_duplicate(4));
        assert!(strategy.is_duplicate(5));
        assert!(!strategy.is_duplicate(6));
    }

    #[test]
    fn default_threshold_is_ten() {
        assert_eq!(ThresholdStrategy::default().threshold(), 10);
    }

    #[test]
    fn description_includes_threshold() {
        let strategy = ThresholdStrategy::new(7);
        assert!(strategy.description().contains("7"));
    }
}
