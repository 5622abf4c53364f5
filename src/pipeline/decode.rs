//! Image decoding: validated bytes → `DynamicImage` + [`ImageMetadata`].
//!
//! Decoding a large JPEG is CPU-bound, so the work runs inside
//! `tokio::task::spawn_blocking` to keep the async workers free while
//! batches are in flight.

use crate::error::Img2MdError;
use crate::output::ImageMetadata;
use crate::pipeline::input::ResolvedInput;
use image::DynamicImage;
use tracing::debug;

/// A decoded image and what we know about it.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub metadata: ImageMetadata,
}

/// Decode resolved input bytes on the blocking pool.
pub async fn decode(input: ResolvedInput) -> Result<DecodedImage, Img2MdError> {
    tokio::task::spawn_blocking(move || decode_blocking(&input))
        .await
        .map_err(|e| Img2MdError::Internal(format!("Decode task panicked: {}", e)))?
}

/// Blocking implementation of decoding.
pub fn decode_blocking(input: &ResolvedInput) -> Result<DecodedImage, Img2MdError> {
    let image = image::load_from_memory_with_format(&input.bytes, input.format.image_format())
        .map_err(|e| Img2MdError::DecodeFailed {
            input: input.source.clone(),
            detail: e.to_string(),
        })?;

    debug!(
        "Decoded {} → {}x{} px ({:?})",
        input.source,
        image.width(),
        image.height(),
        image.color()
    );

    let metadata = ImageMetadata {
        source: input.source.clone(),
        format: input.format.as_str().to_string(),
        width: image.width(),
        height: image.height(),
        color_type: color_type_name(&image),
        byte_len: input.bytes.len() as u64,
    };

    Ok(DecodedImage { image, metadata })
}

/// Metadata for an image that was decoded by the caller.
pub fn metadata_for(image: &DynamicImage, source: impl Into<String>) -> ImageMetadata {
    ImageMetadata {
        source: source.into(),
        format: "raw".to_string(),
        width: image.width(),
        height: image.height(),
        color_type: color_type_name(image),
        byte_len: 0,
    }
}

fn color_type_name(image: &DynamicImage) -> String {
    format!("{:?}", image.color())
}
