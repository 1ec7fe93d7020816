//! DCT-based perceptual hash (pHash) with rotation variants.
//!
//! 1. Convert to luma and downsample to a `4 * hash_size` square grid
//! 2. Apply a 2-D DCT-II to the grid
//! 3. Keep the top-left `hash_size x hash_size` low-frequency block
//! 4. Set one bit per coefficient: 1 if above the block's median
//!
//! The 90/180/270 variants rotate the downsampled grid, never the full
//! image, and run the same bit generation on it.

use super::hash::{Fingerprint, Rotation, RotatedFingerprints};
use super::resize::GridResizer;
use image::{imageops, DynamicImage, GrayImage};
use std::f64::consts::PI;

/// Oversampling factor between the grid and the kept coefficient block
const HIGHFREQ_FACTOR: u32 = 4;

/// Perceptual hasher for one hash size
pub struct PerceptualHasher {
    hash_size: u32,
    grid_size: u32,
    /// cos((2x + 1) * u * PI / 2N), indexed [u * N + x] for u < hash_size
    cos_table: Vec<f64>,
}

impl PerceptualHasher {
    /// Create a hasher producing `hash_size * hash_size` bit fingerprints
    pub fn new(hash_size: u32) -> Self {
        let grid_size = hash_size * HIGHFREQ_FACTOR;
        let n = grid_size as usize;

        let cos_table = (0..hash_size as usize)
            .flat_map(|u| {
                (0..n).map(move |x| ((2 * x + 1) as f64 * u as f64 * PI / (2.0 * n as f64)).cos())
            })
            .collect();

        Self {
            hash_size,
            grid_size,
            cos_table,
        }
    }

    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    /// Side of the downsampled grid
    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// Fingerprint an image at all four rotations
    pub fn hash_rotations(
        &self,
        resizer: &mut GridResizer,
        image: &DynamicImage,
    ) -> Result<RotatedFingerprints, String> {
        let grid = resizer.resize_to_grayscale(image, self.grid_size, self.grid_size)?;
        Ok(self.hash_grid_rotations(&grid))
    }

    /// Fingerprint an already downsampled grid at all four rotations
    pub fn hash_grid_rotations(&self, grid: &GrayImage) -> RotatedFingerprints {
        RotatedFingerprints {
            r0: self.hash_grid(grid),
            r90: self.hash_grid(&rotate_grid(grid, Rotation::R90)),
            r180: self.hash_grid(&rotate_grid(grid, Rotation::R180)),
            r270: self.hash_grid(&rotate_grid(grid, Rotation::R270)),
        }
    }

    /// Fingerprint a single `grid_size` square luma grid
    pub fn hash_grid(&self, grid: &GrayImage) -> Fingerprint {
        let coefficients = self.low_frequency_dct(grid);
        let median = median(&coefficients);
        Fingerprint::from_bits(coefficients.iter().map(|&c| c > median))
    }

    /// Unnormalized DCT-II, keeping only the low-frequency block.
    ///
    /// Returned row-major as [v * hash_size + u], v being the vertical frequency.
    fn low_frequency_dct(&self, grid: &GrayImage) -> Vec<f64> {
        let n = self.grid_size as usize;
        let k = self.hash_size as usize;
        debug_assert_eq!(grid.dimensions(), (self.grid_size, self.grid_size));

        let pixels: Vec<f64> = grid.pixels().map(|p| p[0] as f64).collect();

        // Transform along rows: temp[y][u]
        let mut temp = vec![0.0; n * k];
        for y in 0..n {
            let row = &pixels[y * n..(y + 1) * n];
            for u in 0..k {
                let cos_row = &self.cos_table[u * n..(u + 1) * n];
                temp[y * k + u] = 2.0 * row.iter().zip(cos_row).map(|(p, c)| p * c).sum::<f64>();
            }
        }

        // Transform along columns: result[v][u]
        let mut result = vec![0.0; k * k];
        for v in 0..k {
            let cos_row = &self.cos_table[v * n..(v + 1) * n];
            for u in 0..k {
                let mut sum = 0.0;
                for (y, c) in cos_row.iter().enumerate() {
                    sum += temp[y * k + u] * c;
                }
                result[v * k + u] = 2.0 * sum;
            }
        }

        result
    }
}

/// Rotate a grid counter-clockwise
fn rotate_grid(grid: &GrayImage, rotation: Rotation) -> GrayImage {
    match rotation {
        Rotation::R0 => grid.clone(),
        // imageops rotates clockwise
        Rotation::R90 => imageops::rotate270(grid),
        Rotation::R180 => imageops::rotate180(grid),
        Rotation::R270 => imageops::rotate90(grid),
    }
}

/// Rotate a luma image counter-clockwise (used by structural refinement too)
pub fn rotate_luma(image: &GrayImage, rotation: Rotation) -> GrayImage {
    rotate_grid(image, rotation)
}

/// Median; the mean of the two middle values for an even count
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb};

    fn pattern_grid(size: u32) -> GrayImage {
        ImageBuffer::from_fn(size, size, |x, y| {
            let value = (x * 7 + y * y * 3 + (x * y) % 11) % 256;
            Luma([value as u8])
        })
    }

    fn pattern_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let v = if (x / 40 + y / 25) % 2 == 0 { 220 } else { 30 };
            let g = ((x * 255) / width) as u8;
            Rgb([v, g, (255 - v) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn median_of_even_count_averages_middle() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn fingerprint_length_follows_hash_size() {
        for size in [8, 16, 32] {
            let hasher = PerceptualHasher::new(size);
            let grid = pattern_grid(hasher.grid_size());
            assert_eq!(hasher.hash_grid(&grid).bit_len(), (size * size) as usize);
        }
    }

    #[test]
    fn identical_grids_produce_identical_fingerprints() {
        let hasher = PerceptualHasher::new(8);
        let grid = pattern_grid(32);
        assert_eq!(hasher.hash_grid(&grid).distance(&hasher.hash_grid(&grid)), 0);
    }

    #[test]
    fn rotated_grid_matches_rotation_variant() {
        let hasher = PerceptualHasher::new(8);
        let grid = pattern_grid(32);
        let original = hasher.hash_grid_rotations(&grid);

        // Rotating the source by 90 degrees clockwise means rotating it back
        // counter-clockwise recovers the original.
        let turned = imageops::rotate90(&grid);
        let turned_hashes = hasher.hash_grid_rotations(&turned);

        assert_eq!(turned_hashes.r90.distance(&original.r0), 0);
        assert_eq!(turned_hashes.r0.distance(&original.r270), 0);
    }

    #[test]
    fn different_content_produces_distant_fingerprints() {
        let hasher = PerceptualHasher::new(8);
        let grid = pattern_grid(32);
        let inverted: GrayImage =
            ImageBuffer::from_fn(32, 32, |x, y| Luma([255 - grid.get_pixel(x, y)[0]]));

        let distance = hasher.hash_grid(&grid).distance(&hasher.hash_grid(&inverted));
        assert!(distance > 20, "expected distant hashes, got {}", distance);
    }

    #[test]
    fn rescaled_image_stays_close() {
        let hasher = PerceptualHasher::new(8);
        let mut resizer = GridResizer::new();

        let large = pattern_image(640, 480);
        let small = large.resize_exact(320, 240, imageops::FilterType::Triangle);

        let a = hasher.hash_rotations(&mut resizer, &large).unwrap();
        let b = hasher.hash_rotations(&mut resizer, &small).unwrap();
        assert!(a.r0.distance(&b.r0) <= 6, "distance {}", a.r0.distance(&b.r0));
    }
}
