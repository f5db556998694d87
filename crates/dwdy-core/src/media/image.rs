//! Image upload processing
//!
//! Decoding and resampling belong to an [`ImageCodec`]; this module sizes
//! the thumbnail and packages the result as an upload-ready draft.

use std::sync::Arc;

use tracing::debug;

use super::data_uri;
use crate::error::{DwdyError, Result};
use crate::models::{ImageDraft, UploadFile};

/// Decoder/encoder for one or more image formats
pub trait ImageCodec: Send + Sync {
    /// Pixel width and height of the encoded image
    fn dimensions(&self, data: &[u8], mime_type: &str) -> Result<(u32, u32)>;

    /// Re-encode the image at the given size, in the same format
    fn resize(&self, data: &[u8], mime_type: &str, width: u32, height: u32) -> Result<Vec<u8>>;
}

/// Thumbnail size for an image: width capped at `target_width`, height
/// scaled to keep the aspect ratio
pub fn thumbnail_size(width: u32, height: u32, target_width: u32) -> Result<(u32, u32)> {
    if width == 0 || height == 0 || target_width == 0 {
        return Err(DwdyError::invalid(format!(
            "cannot size a thumbnail for {width}x{height} at width {target_width}"
        )));
    }

    let thumb_width = width.min(target_width);
    let scaled = (f64::from(height) * f64::from(thumb_width) / f64::from(width)).round();
    Ok((thumb_width, (scaled as u32).max(1)))
}

/// Measure `file`, build its thumbnail, and return the draft to upload
pub fn process_image(codec: &dyn ImageCodec, file: UploadFile, target_width: u32) -> Result<ImageDraft> {
    if !file.file_type.starts_with("image/") {
        return Err(DwdyError::invalid(format!(
            "'{}' is not an image ({})",
            file.name, file.file_type
        )));
    }

    let (width, height) = codec.dimensions(&file.data, &file.file_type)?;
    let (thumb_width, thumb_height) = thumbnail_size(width, height, target_width)?;
    let thumb = codec.resize(&file.data, &file.file_type, thumb_width, thumb_height)?;

    debug!(
        "Processed image {} ({}x{}, thumbnail {}x{})",
        file.name, width, height, thumb_width, thumb_height
    );

    Ok(ImageDraft {
        thumbnail: data_uri(&file.file_type, &thumb),
        width,
        height,
        file,
    })
}

/// [`process_image`] on the blocking thread pool
pub async fn process_image_in_worker(
    codec: Arc<dyn ImageCodec>,
    file: UploadFile,
    target_width: u32,
) -> Result<ImageDraft> {
    tokio::task::spawn_blocking(move || process_image(codec.as_ref(), file, target_width))
        .await
        .map_err(|e| DwdyError::Worker(format!("image worker failed: {e}")))?
}
