//! # Fingerprint Module
//!
//! Computes rotation-aware perceptual fingerprints and the metadata of one
//! image.
//!
//! ## How It Works
//! 1. Read the file (memory-mapped when large) and sniff its codec
//! 2. Read the dimensions from the header; reject images whose shorter
//!    side is below the minimum resolution before decoding any pixels
//! 3. Decode, downsample to a luma grid and compute pHash at 0/90/180/270°
//!
//! ## Performance Optimizations
//! - Uses `zune-jpeg` for 1.5-2x faster JPEG decoding
//! - Uses `fast_image_resize` for SIMD-accelerated Lanczos3 downsampling
//! - Rotations are applied to the small grid, never the full image
//!
//! ## Example
//! ```rust,ignore
//! use image_dedup::core::fingerprint::{FingerprintEngine, RecordExtractor};
//!
//! let engine = FingerprintEngine::new(8, 100);
//! let record = engine.extract(&path)?;
//! println!("{}", record.fingerprints.r0);
//! ```

pub mod decode;
mod hash;
mod phash;
pub mod resize;
mod traits;

pub use hash::{Fingerprint, RotatedFingerprints, Rotation};
pub use phash::{rotate_luma, PerceptualHasher};
pub use traits::RecordExtractor;

use crate::core::config::DedupConfig;
use crate::core::metadata::{self, ImageFormat, ImageRecord};
use crate::error::ExtractionError;
use decode::FastDecoder;
use resize::GridResizer;
use std::path::Path;

/// Extracts [`ImageRecord`]s from files on disk
pub struct FingerprintEngine {
    hasher: PerceptualHasher,
    min_resolution: u32,
}

impl FingerprintEngine {
    /// Create an engine for one hash size and minimum side length
    pub fn new(hash_size: u32, min_resolution: u32) -> Self {
        Self {
            hasher: PerceptualHasher::new(hash_size),
            min_resolution,
        }
    }

    /// Create an engine from a validated run configuration
    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(config.hash_size, config.min_resolution)
    }

    pub fn min_resolution(&self) -> u32 {
        self.min_resolution
    }

    fn check_resolution(&self, path: &Path, width: u32, height: u32) -> Result<(), ExtractionError> {
        if width.min(height) < self.min_resolution {
            return Err(ExtractionError::BelowMinimumResolution {
                path: path.to_path_buf(),
                width,
                height,
                min_resolution: self.min_resolution,
            });
        }
        Ok(())
    }
}

impl RecordExtractor for FingerprintEngine {
    fn extract(&self, path: &Path) -> Result<ImageRecord, ExtractionError> {
        let bytes = decode::read_file_bytes(path)?;
        let detected = decode::sniff_format(path, &bytes)?;

        let (width, height) = decode::read_dimensions(path, &bytes, detected)?;
        self.check_resolution(path, width, height)?;

        let image = FastDecoder::decode(path, &bytes, detected)?;
        // Trust decoded dimensions over the header
        let (width, height) = (image.width(), image.height());
        self.check_resolution(path, width, height)?;

        let mut resizer = GridResizer::new();
        let fingerprints = self
            .hasher
            .hash_rotations(&mut resizer, &image)
            .map_err(|reason| ExtractionError::Decode {
                path: path.to_path_buf(),
                reason,
            })?;

        Ok(ImageRecord {
            path: path.to_path_buf(),
            width,
            height,
            file_size: bytes.len_u64(),
            format: ImageFormat::from_detected(detected),
            bit_depth: Some(metadata::bit_depth_of(image.color())),
            has_exif: metadata::has_exif(&bytes),
            fingerprints,
        })
    }

    fn hash_size(&self) -> u32 {
        self.hasher.hash_size()
    }
}
