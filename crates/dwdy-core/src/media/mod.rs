//! Media workers
//!
//! Image thumbnailing and sound recording run off the caller's task. Their
//! finished output ([`ImageDraft`](crate::models::ImageDraft),
//! [`SoundRecord`]) is the only thing handed to the journal's write path.

pub mod image;
pub mod recorder;

use base64::{engine::general_purpose::STANDARD, Engine as _};

pub use image::{process_image, process_image_in_worker, thumbnail_size, ImageCodec};
pub use recorder::{
    spawn_recorder, AudioFormat, RecorderCommand, RecorderHandle, RecorderState, SoundRecord,
};

/// Encode bytes as a `data:` URI
pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri("image/png", b"abc"), "data:image/png;base64,YWJj");
        assert_eq!(data_uri("audio/ogg", b""), "data:audio/ogg;base64,");
    }
}
