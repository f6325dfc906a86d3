//! Adaptive JPEG recompression.
//!
//! Arbitrary user photos are decoded, downscaled once to a bounded edge
//! length, then re-encoded at decreasing quality until they fit the byte
//! budget or the quality floor is reached. The floor attempt is kept even
//! when it is still oversized, so the result is best effort rather than a
//! hard guarantee.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use tracing::debug;

use crate::error::MediaError;

/// One raw image as produced by a file picker. Consumed exactly once.
///
/// The filename is carried for display only; storage keys are never
/// derived from it.
#[derive(Debug, Clone)]
pub struct RawImageInput {
    pub bytes: Bytes,
    pub filename: String,
}

impl RawImageInput {
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }
}

/// A size-bounded JPEG produced by [`ImageCompressor::compress`].
///
/// Invariant: `len() <= target_max_bytes` or `quality` equals the
/// configured floor.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    /// JPEG payload.
    pub bytes: Bytes,
    /// The quality factor the final encode pass used.
    pub quality: f32,
}

impl CompressedImage {
    /// Logical content type of every compressed image.
    pub const CONTENT_TYPE: &'static str = "image/jpeg";

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty. Never true for a real encode.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Tunables for the compression loop. Defaults reproduce the production
/// behavior: 1000 px longest edge, 400 KiB budget, quality 0.7 stepping
/// down by 0.1 to a floor of 0.2.
#[derive(Debug, Clone)]
pub struct CompressorOptions {
    /// Longest allowed edge after the single downscale pass.
    pub max_dimension: u32,
    /// Byte budget the quality loop tries to reach.
    pub target_max_bytes: usize,
    /// Quality of the first encode pass.
    pub initial_quality: f32,
    /// Quality below which the loop never descends.
    pub quality_floor: f32,
    /// Quality decrement between passes.
    pub quality_step: f32,
}

impl Default for CompressorOptions {
    fn default() -> Self {
        Self {
            max_dimension: 1000,
            target_max_bytes: 400 * 1024,
            initial_quality: 0.7,
            quality_floor: 0.2,
            quality_step: 0.1,
        }
    }
}

/// Recompresses raw images down to the configured byte budget.
#[derive(Debug, Clone, Default)]
pub struct ImageCompressor {
    options: CompressorOptions,
}

impl ImageCompressor {
    #[must_use]
    pub fn new(options: CompressorOptions) -> Self {
        Self { options }
    }

    /// Return the active options.
    #[must_use]
    pub fn options(&self) -> &CompressorOptions {
        &self.options
    }

    /// Compress one raw image.
    ///
    /// Decode, scale, and encode run on the blocking pool so executor
    /// threads stay free for other work. Undecodable input fails with
    /// [`MediaError::Decode`] and produces no partial output.
    pub async fn compress(&self, raw: RawImageInput) -> Result<CompressedImage, MediaError> {
        let options = self.options.clone();
        let bytes = raw.bytes;
        tokio::task::spawn_blocking(move || compress_blocking(&bytes, &options))
            .await
            .map_err(|e| MediaError::Encode(e.to_string()))?
    }
}

fn compress_blocking(
    bytes: &[u8],
    options: &CompressorOptions,
) -> Result<CompressedImage, MediaError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| MediaError::Decode(e.to_string()))?;

    // Downscale runs exactly once; `resize` preserves the aspect ratio so
    // the longer side lands on `max_dimension`.
    let (width, height) = (decoded.width(), decoded.height());
    let scaled = if width.max(height) > options.max_dimension {
        decoded.resize(
            options.max_dimension,
            options.max_dimension,
            FilterType::Lanczos3,
        )
    } else {
        decoded
    };
    let rgb = scaled.to_rgb8();

    // Integer percent so repeated decrements land exactly on the floor.
    let floor = quality_percent(options.quality_floor);
    let step = quality_percent(options.quality_step);
    let mut quality = quality_percent(options.initial_quality);

    let mut encoded = encode_jpeg(&rgb, quality)?;
    while encoded.len() > options.target_max_bytes
        && step > 0
        && quality.saturating_sub(step) >= floor
    {
        quality -= step;
        encoded = encode_jpeg(&rgb, quality)?;
        debug!(quality, size = encoded.len(), "re-encoded image");
    }

    Ok(CompressedImage {
        bytes: Bytes::from(encoded),
        quality: f32::from(quality) / 100.0,
    })
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, MediaError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode_image(rgb)
        .map_err(|e| MediaError::Encode(e.to_string()))?;
    Ok(buf)
}

fn quality_percent(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(0.0, 100.0) as u8
}
