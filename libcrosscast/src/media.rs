//! Media preparation
//!
//! Every publish derives a fresh JPEG from the attached source bytes. Nothing
//! here mutates a [`MediaItem`]; platforms with different width bounds each get
//! their own normalized copy.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::error::MediaError;
use crate::types::MediaItem;

/// Encoding produced by [`normalize`]
pub const NORMALIZED_MIME: &str = "image/jpeg";

/// A re-encoded image ready for upload
#[derive(Clone, PartialEq)]
pub struct NormalizedImage {
    /// Id of the [`MediaItem`] this was derived from
    pub source_id: String,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl NormalizedImage {
    pub fn mime_type(&self) -> &'static str {
        NORMALIZED_MIME
    }
}

impl std::fmt::Debug for NormalizedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedImage")
            .field("source_id", &self.source_id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Target dimensions for a `width` x `height` image bounded by `max_width`
///
/// Never upscales. Height is rounded to the nearest pixel and never drops
/// below one.
pub fn target_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled.max(1))
}

/// Decode, bound the width, and re-encode as JPEG at `quality` (1..=100)
///
/// # Errors
///
/// `MediaError::Decode` if the bytes are not a readable image,
/// `MediaError::Encode` if JPEG encoding fails.
pub fn normalize(
    item: &MediaItem,
    max_width: u32,
    quality: u8,
) -> Result<NormalizedImage, MediaError> {
    let decoded = image::load_from_memory(&item.data)
        .map_err(|e| MediaError::Decode(format!("{}: {}", item.file_name, e)))?;

    let (width, height) = target_dimensions(decoded.width(), decoded.height(), max_width);
    let resized = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Lanczos3)
    };

    // JPEG has no alpha channel
    let rgb = resized.to_rgb8();

    let mut data = Vec::new();
    {
        let mut encoder =
            JpegEncoder::new_with_quality(Cursor::new(&mut data), quality.clamp(1, 100));
        encoder
            .encode_image(&rgb)
            .map_err(|e| MediaError::Encode(format!("{}: {}", item.file_name, e)))?;
    }

    tracing::debug!(
        file = %item.file_name,
        width,
        height,
        bytes = data.len(),
        "Normalized image"
    );

    Ok(NormalizedImage {
        source_id: item.id.clone(),
        file_name: jpeg_file_name(&item.file_name),
        width,
        height,
        data,
    })
}

fn jpeg_file_name(original: &str) -> String {
    let stem = std::path::Path::new(original)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());
    format!("{}.jpg", stem)
}
