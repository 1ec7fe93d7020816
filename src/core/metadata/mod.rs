//! # Metadata Module
//!
//! The per-image record produced by extraction, and the quality-relevant
//! metadata read alongside the fingerprints.
//!
//! ## Extracted Fields
//! - Pixel dimensions and file size
//! - Codec, detected from file content (never the extension)
//! - Bits per pixel of the decoded colour type
//! - EXIF presence (JPEG, TIFF, PNG and WebP containers)

use crate::core::fingerprint::RotatedFingerprints;
use exif::Reader;
use image::ColorType;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;

/// Decoded image codec
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    WebP,
    /// Any other codec the decoder understood, by upper-case name
    Other(String),
}

impl ImageFormat {
    /// Map the decoder's format detection to a codec class
    pub fn from_detected(format: image::ImageFormat) -> Self {
        match format {
            image::ImageFormat::Jpeg => Self::Jpeg,
            image::ImageFormat::Png => Self::Png,
            image::ImageFormat::Gif => Self::Gif,
            image::ImageFormat::Bmp => Self::Bmp,
            image::ImageFormat::Tiff => Self::Tiff,
            image::ImageFormat::WebP => Self::WebP,
            other => Self::Other(format!("{:?}", other).to_uppercase()),
        }
    }

    /// Parse the stored codec name
    pub fn from_name(name: &str) -> Self {
        match name.to_uppercase().as_str() {
            "JPEG" | "JPG" => Self::Jpeg,
            "PNG" => Self::Png,
            "GIF" => Self::Gif,
            "BMP" => Self::Bmp,
            "TIFF" => Self::Tiff,
            "WEBP" => Self::WebP,
            other => Self::Other(other.to_string()),
        }
    }

    /// Upper-case codec name as stored in checkpoints
    pub fn as_str(&self) -> &str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
            Self::WebP => "WEBP",
            Self::Other(name) => name,
        }
    }

    /// Whether the codec keeps every pixel
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Png | Self::Tiff | Self::Bmp | Self::WebP)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ImageFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ImageFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// One successfully processed image.
///
/// Records only exist for images whose extraction fully succeeded; the
/// four fingerprints always share one bit length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Absolute, normalized path; the record's identity
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Bytes on disk
    pub file_size: u64,
    pub format: ImageFormat,
    /// Bits per pixel, when known
    pub bit_depth: Option<u32>,
    pub has_exif: bool,
    pub fingerprints: RotatedFingerprints,
}

impl ImageRecord {
    /// Pixel count
    pub fn resolution(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// width / height, or 0 when the height is zero
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    /// Long side over short side; None for a zero dimension.
    ///
    /// Unlike [`aspect_ratio`](Self::aspect_ratio) this is the same for an
    /// image and its 90° rotation.
    pub fn orientation_free_ratio(&self) -> Option<f64> {
        let short = self.width.min(self.height);
        let long = self.width.max(self.height);
        (short > 0).then(|| long as f64 / short as f64)
    }

    pub fn is_lossless(&self) -> bool {
        self.format.is_lossless()
    }

    /// Dimensions as "WxH"
    pub fn dimensions_display(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Bits per channel sample of a decoded colour type (8 for RGB8, 16 for RGB16)
pub fn bit_depth_of(color: ColorType) -> u32 {
    let channels = color.channel_count().max(1) as u32;
    color.bits_per_pixel() as u32 / channels
}

/// Check whether the encoded bytes carry an EXIF block
pub fn has_exif(bytes: &[u8]) -> bool {
    let mut cursor = Cursor::new(bytes);
    Reader::new().read_from_container(&mut cursor).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::Fingerprint;

    fn record(width: u32, height: u32) -> ImageRecord {
        let fp = Fingerprint::from_bytes(vec![0; 8]);
        ImageRecord {
            path: PathBuf::from("/photos/a.jpg"),
            width,
            height,
            file_size: 1000,
            format: ImageFormat::Jpeg,
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

    #[test]
    fn lossless_set_matches_codecs() {
        assert!(ImageFormat::Png.is_lossless());
        assert!(ImageFormat::Tiff.is_lossless());
        assert!(ImageFormat::Bmp.is_lossless());
        assert!(ImageFormat::WebP.is_lossless());
        assert!(!ImageFormat::Jpeg.is_lossless());
        assert!(!ImageFormat::Gif.is_lossless());
        assert!(!ImageFormat::Other("ICO".into()).is_lossless());
    }

    #[test]
    fn format_names_parse_back() {
        for format in [
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::Gif,
            ImageFormat::Bmp,
            ImageFormat::Tiff,
            ImageFormat::WebP,
        ] {
            assert_eq!(ImageFormat::from_name(format.as_str()), format);
        }
        assert_eq!(ImageFormat::from_name("webp"), ImageFormat::WebP);
        assert_eq!(
            ImageFormat::from_name("UNKNOWN"),
            ImageFormat::Other("UNKNOWN".into())
        );
    }

    #[test]
    fn detected_formats_map_to_codecs() {
        assert_eq!(
            ImageFormat::from_detected(image::ImageFormat::Jpeg),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImageFormat::from_detected(image::ImageFormat::Ico),
            ImageFormat::Other("ICO".into())
        );
    }

    #[test]
    fn aspect_ratio_handles_zero_height() {
        assert_eq!(record(1920, 1080).aspect_ratio(), 1920.0 / 1080.0);
        assert_eq!(record(100, 0).aspect_ratio(), 0.0);
    }

    #[test]
    fn orientation_free_ratio_ignores_rotation() {
        assert_eq!(
            record(1920, 1080).orientation_free_ratio(),
            record(1080, 1920).orientation_free_ratio()
        );
        assert_eq!(record(0, 50).orientation_free_ratio(), None);
    }

    #[test]
    fn resolution_does_not_overflow() {
        assert_eq!(record(100_000, 100_000).resolution(), 10_000_000_000);
    }

    #[test]
    fn bit_depth_follows_colour_type() {
        assert_eq!(bit_depth_of(ColorType::L8), 8);
        assert_eq!(bit_depth_of(ColorType::Rgb8), 8);
        assert_eq!(bit_depth_of(ColorType::Rgba8), 8);
        assert_eq!(bit_depth_of(ColorType::La8), 8);
        assert_eq!(bit_depth_of(ColorType::Rgb16), 16);
        assert_eq!(bit_depth_of(ColorType::L16), 16);
        assert_eq!(bit_depth_of(ColorType::Rgb32F), 32);
    }

    #[test]
    fn plain_png_has_no_exif() {
        let img = image::RgbImage::new(4, 4);
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        assert!(!has_exif(&bytes));
        assert!(!has_exif(b"not an image"));
    }
}
