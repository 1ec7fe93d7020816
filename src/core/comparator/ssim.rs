//! Structural similarity (SSIM) refinement.
//!
//! Both images are decoded to luma, the second is turned by the rotation
//! offset found during hashing, both are resized to 256x256, and the mean
//! SSIM over all fully contained 7x7 windows is returned.
//!
//! Constants follow Wang et al. (2004): K1 = 0.01, K2 = 0.03, L = 255, with
//! the sample covariance of each window.

use super::traits::StructuralRefiner;
use crate::core::fingerprint::decode::{self, FastDecoder};
use crate::core::fingerprint::resize::GridResizer;
use crate::core::fingerprint::{rotate_luma, Rotation};
use crate::error::ExtractionError;
use image::GrayImage;
use std::path::Path;

/// Side of the square both images are compared at
const COMPARE_SIZE: u32 = 256;
/// Side of the sliding window
const WINDOW: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DYNAMIC_RANGE: f64 = 255.0;

/// SSIM-based edge refiner
#[derive(Debug, Clone)]
pub struct SsimRefiner {
    min_score: f64,
}

impl SsimRefiner {
    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }

    fn load(&self, path: &Path, resizer: &mut GridResizer) -> Result<GrayImage, ExtractionError> {
        let bytes = decode::read_file_bytes(path)?;
        let format = decode::sniff_format(path, &bytes)?;
        let image = FastDecoder::decode(path, &bytes, format)?;
        resizer
            .resize_to_grayscale(&image, COMPARE_SIZE, COMPARE_SIZE)
            .map_err(|reason| ExtractionError::Decode {
                path: path.to_path_buf(),
                reason,
            })
    }
}

impl StructuralRefiner for SsimRefiner {
    fn score(&self, a: &Path, b: &Path, offset: Rotation) -> Result<f64, ExtractionError> {
        let mut resizer = GridResizer::new();
        let image_a = self.load(a, &mut resizer)?;
        // Rotating the square after resizing is the same as before
        let image_b = rotate_luma(&self.load(b, &mut resizer)?, offset);
        Ok(structural_similarity(&image_a, &image_b))
    }

    fn min_score(&self) -> f64 {
        self.min_score
    }
}

/// Mean SSIM of two equally sized luma images.
///
/// Images smaller than one window in either dimension are compared as a
/// single window.
pub fn structural_similarity(a: &GrayImage, b: &GrayImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());

    let (width, height) = a.dimensions();
    let (width, height) = (width as usize, height as usize);
    let win_w = WINDOW.min(width);
    let win_h = WINDOW.min(height);
    if win_w == 0 || win_h == 0 {
        return 1.0;
    }

    let xs: Vec<f64> = a.pixels().map(|p| p[0] as f64).collect();
    let ys: Vec<f64> = b.pixels().map(|p| p[0] as f64).collect();

    let sum_x = IntegralImage::new(width, height, |i| xs[i]);
    let sum_y = IntegralImage::new(width, height, |i| ys[i]);
    let sum_xx = IntegralImage::new(width, height, |i| xs[i] * xs[i]);
    let sum_yy = IntegralImage::new(width, height, |i| ys[i] * ys[i]);
    let sum_xy = IntegralImage::new(width, height, |i| xs[i] * ys[i]);

    let c1 = (K1 * DYNAMIC_RANGE).powi(2);
    let c2 = (K2 * DYNAMIC_RANGE).powi(2);
    let n = (win_w * win_h) as f64;
    let cov_norm = if n > 1.0 { n / (n - 1.0) } else { 1.0 };

    let mut total = 0.0;
    let mut windows = 0usize;

    for y in 0..=(height - win_h) {
        for x in 0..=(width - win_w) {
            let mu_x = sum_x.window(x, y, win_w, win_h) / n;
            let mu_y = sum_y.window(x, y, win_w, win_h) / n;
            let var_x = cov_norm * (sum_xx.window(x, y, win_w, win_h) / n - mu_x * mu_x);
            let var_y = cov_norm * (sum_yy.window(x, y, win_w, win_h) / n - mu_y * mu_y);
            let cov_xy = cov_norm * (sum_xy.window(x, y, win_w, win_h) / n - mu_x * mu_y);

            let numerator = (2.0 * mu_x * mu_y + c1) * (2.0 * cov_xy + c2);
            let denominator = (mu_x * mu_x + mu_y * mu_y + c1) * (var_x + var_y + c2);

            total += numerator / denominator;
            windows += 1;
        }
    }

    total / windows as f64
}

/// Summed-area table for O(1) window sums
struct IntegralImage {
    stride: usize,
    sums: Vec<f64>,
}

impl IntegralImage {
    fn new(width: usize, height: usize, value: impl Fn(usize) -> f64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];

        for y in 0..height {
            let mut row_sum = 0.0;
            for x in 0..width {
                row_sum += value(y * width + x);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row_sum;
            }
        }

        Self { stride, sums }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let s = self.stride;
        self.sums[(y + h) * s + x + w] - self.sums[y * s + x + w] - self.sums[(y + h) * s + x]
            + self.sums[y * s + x]
    }
}
