//! Output types returned by the conversion entry points.

use crate::error::{ImageError, Img2MdError};
use crate::pipeline::structure::StructureSummary;
use serde::{Deserialize, Serialize};

/// Facts about the source image, available without running OCR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// File path, URL, or a placeholder for in-memory input.
    pub source: String,
    /// Detected container format (`"png"`, `"jpeg"`).
    pub format: String,
    pub width: u32,
    pub height: u32,
    /// Colour layout of the decoded image, e.g. `"Rgb8"`, `"La8"`.
    pub color_type: String,
    /// Size of the encoded input in bytes (0 for pre-decoded images).
    pub byte_len: u64,
}

/// Timing and structure counts for one converted image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Name of the OCR engine that produced the text.
    pub ocr_engine: String,
    /// Whether the contrast-stretch normaliser ran.
    pub normalized: bool,
    /// The image was flat and normalised to all zeros.
    pub degenerate_image: bool,
    /// Characters of OCR text after trimming; 0 means no text detected.
    pub text_chars: usize,
    pub structure: StructureSummary,
    pub decode_duration_ms: u64,
    pub normalize_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of converting one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Markdown reconstruction, including front-matter when requested.
    pub markdown: String,
    /// OCR text exactly as the engine returned it.
    pub raw_text: String,
    pub metadata: ImageMetadata,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// `true` when the OCR engine found no text (after trimming).
    pub fn is_empty(&self) -> bool {
        self.raw_text.trim().is_empty()
    }
}

/// One successfully converted image of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    /// 1-based position in the batch input list.
    pub image_num: usize,
    pub output: ConversionOutput,
}

/// Aggregate counts for a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: usize,
    /// Converted images in which no text was detected.
    pub empty_images: usize,
    pub total_duration_ms: u64,
}

/// Result of converting several images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// Markdown of all converted images in input order, separated per config.
    pub markdown: String,
    /// Converted images, sorted by `image_num`.
    pub images: Vec<ImageResult>,
    /// Failed images, sorted by image number.
    pub errors: Vec<ImageError>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// Treat any failed image as an error.
    pub fn into_result(self) -> Result<Self, Img2MdError> {
        match self.errors.first() {
            None => Ok(self),
            Some(first) => Err(Img2MdError::Internal(format!(
                "{}/{} images failed; first: {}",
                self.stats.failed_images, self.stats.total_images, first
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(raw: &str) -> ConversionOutput {
        ConversionOutput {
            markdown: raw.trim().to_string(),
            raw_text: raw.to_string(),
            metadata: ImageMetadata {
                source: "scan.png".into(),
                format: "png".into(),
                width: 10,
                height: 10,
                color_type: "Rgb8".into(),
                byte_len: 120,
            },
            stats: ConversionStats::default(),
        }
    }

    #[test]
    fn whitespace_only_text_is_empty() {
        assert!(output(" \n\x0c").is_empty());
        assert!(!output("text").is_empty());
    }

    #[test]
    fn output_is_json_serialisable() {
        let json = serde_json::to_string(&output("HELLO")).expect("serialise");
        assert!(json.contains("\"format\":\"png\""));
        assert!(json.contains("\"raw_text\":\"HELLO\""));
    }

    #[test]
    fn into_result_fails_on_any_error() {
        let batch = BatchOutput {
            markdown: String::new(),
            images: vec![],
            errors: vec![ImageError::Decode {
                image_num: 2,
                input: "b.jpg".into(),
                detail: "truncated".into(),
            }],
            stats: BatchStats {
                total_images: 2,
                processed_images: 1,
                failed_images: 1,
                ..Default::default()
            },
        };
        let err = batch.into_result().unwrap_err();
        assert!(err.to_string().contains("1/2"));
    }
}
