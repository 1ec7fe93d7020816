//! File reading and image decoding.
//!
//! Files of 1MB or more are memory-mapped to avoid the kernel copy; smaller
//! files are read into a buffer. The codec is sniffed from the bytes, then
//! JPEG goes through zune-jpeg (1.5-2x faster than the image crate) with
//! the image crate as fallback for everything else.

use crate::core::metadata::ImageFormat;
use crate::error::ExtractionError;
use image::{DynamicImage, ImageBuffer, ImageReader, Luma, Rgb, Rgba};
use memmap2::Mmap;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Minimum file size to use memory-mapped I/O (1MB)
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// File bytes that may be either owned or memory-mapped
pub enum FileBytes {
    Vec(Vec<u8>),
    Mmap(Mmap),
}

impl FileBytes {
    pub fn len_u64(&self) -> u64 {
        self.as_ref().len() as u64
    }
}

impl AsRef<[u8]> for FileBytes {
    fn as_ref(&self) -> &[u8] {
        match self {
            FileBytes::Vec(v) => v,
            FileBytes::Mmap(m) => m,
        }
    }
}

impl std::ops::Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

/// Read a whole file, memory-mapping it when it is large
pub fn read_file_bytes(path: &Path) -> Result<FileBytes, ExtractionError> {
    let io_error = |source| ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(path).map_err(io_error)?;

    if metadata.len() >= MMAP_THRESHOLD {
        let file = File::open(path).map_err(io_error)?;
        // SAFETY: the map is read-only and lives no longer than this extraction.
        let mmap = unsafe { Mmap::map(&file) }.map_err(io_error)?;
        Ok(FileBytes::Mmap(mmap))
    } else {
        let bytes = std::fs::read(path).map_err(io_error)?;
        Ok(FileBytes::Vec(bytes))
    }
}

/// Detect the codec from the leading bytes
pub fn sniff_format(path: &Path, bytes: &[u8]) -> Result<image::ImageFormat, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::EmptyImage {
            path: path.to_path_buf(),
        });
    }

    image::guess_format(bytes).map_err(|_| ExtractionError::UnsupportedFormat {
        path: path.to_path_buf(),
    })
}

/// Read the dimensions from the header without decoding pixels
pub fn read_dimensions(
    path: &Path,
    bytes: &[u8],
    format: image::ImageFormat,
) -> Result<(u32, u32), ExtractionError> {
    ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| ExtractionError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Decoder that picks the fastest path per codec
pub struct FastDecoder;

impl FastDecoder {
    /// Decode encoded bytes of a known codec
    pub fn decode(
        path: &Path,
        bytes: &[u8],
        format: image::ImageFormat,
    ) -> Result<DynamicImage, ExtractionError> {
        let image = match ImageFormat::from_detected(format) {
            ImageFormat::Jpeg => Self::decode_jpeg(path, bytes)
                .or_else(|_| Self::decode_fallback(path, bytes, format))?,
            _ => Self::decode_fallback(path, bytes, format)?,
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractionError::EmptyImage {
                path: path.to_path_buf(),
            });
        }

        Ok(image)
    }

    fn decode_jpeg(path: &Path, bytes: &[u8]) -> Result<DynamicImage, ExtractionError> {
        let decode_error = |reason: String| ExtractionError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
        let mut decoder = JpegDecoder::new_with_options(bytes, options);

        let pixels = decoder
            .decode()
            .map_err(|e| decode_error(format!("zune-jpeg decode failed: {:?}", e)))?;

        let info = decoder
            .info()
            .ok_or_else(|| decode_error("missing JPEG header info".to_string()))?;

        let width = info.width as u32;
        let height = info.height as u32;

        let image = match decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB) {
            ColorSpace::RGB => {
                let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| decode_error("truncated RGB buffer".to_string()))?;
                DynamicImage::ImageRgb8(buffer)
            }
            ColorSpace::RGBA => {
                let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| decode_error("truncated RGBA buffer".to_string()))?;
                DynamicImage::ImageRgba8(buffer)
            }
            ColorSpace::Luma => {
                let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| decode_error("truncated luma buffer".to_string()))?;
                DynamicImage::ImageLuma8(buffer)
            }
            other => return Err(decode_error(format!("unhandled colourspace {:?}", other))),
        };

        Ok(image)
    }

    fn decode_fallback(
        path: &Path,
        bytes: &[u8],
        format: image::ImageFormat,
    ) -> Result<DynamicImage, ExtractionError> {
        image::load_from_memory_with_format(bytes, format).map_err(|e| ExtractionError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
