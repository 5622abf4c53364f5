//! Error types for the edgequake-img2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Img2MdError`]: **Fatal**: the conversion cannot proceed at all
//!   (unreadable file, unsupported format, OCR engine missing). Returned as
//!   `Err(Img2MdError)` from the top-level `convert*` functions.
//!
//! * [`ImageError`]: **Non-fatal**: one image of a batch failed but the
//!   others are fine. Yielded by [`crate::stream::convert_stream`] and
//!   collected in [`crate::output::BatchOutput`] so callers can inspect
//!   partial success.
//!
//! Neither the normaliser nor the structure engine can fail: a flat image
//! normalises to zeros and empty OCR text is simply empty Markdown.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-img2md library.
#[derive(Debug, Error)]
pub enum Img2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Input is larger than the configured upload limit.
    #[error("Input '{input}' is {size} bytes, above the {limit}-byte limit")]
    InputTooLarge { input: String, size: u64, limit: u64 },

    /// The bytes are not a PNG or JPEG image.
    #[error("Unsupported image format for '{input}' (first bytes: {magic:02x?})\nSupported formats: PNG, JPG, JPEG.")]
    UnsupportedFormat { input: String, magic: Vec<u8> },

    /// The header looked right but the image could not be decoded.
    #[error("Failed to decode image '{input}': {detail}")]
    DecodeFailed { input: String, detail: String },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// No usable OCR engine (tesseract missing and none injected).
    #[error("OCR engine '{engine}' is not available.\n{hint}")]
    OcrEngineUnavailable { engine: String, hint: String },

    /// The OCR engine ran but reported failure.
    #[error("OCR engine '{engine}' failed: {detail}")]
    OcrFailed { engine: String, detail: String },

    /// The OCR engine exceeded its time budget and was killed.
    #[error("OCR engine '{engine}' timed out after {secs}s\nIncrease --ocr-timeout.")]
    OcrTimeout { engine: String, secs: u64 },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Every image of a batch failed; output would be empty.
    #[error("All {total} images failed.\nFirst error: {first_error}")]
    AllImagesFailed { total: usize, first_error: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image of a batch.
///
/// `image_num` is the 1-based position of the image in the batch input list.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The input could not be read, downloaded or accepted.
    #[error("Image {image_num} ('{input}'): {detail}")]
    Input {
        image_num: usize,
        input: String,
        detail: String,
    },

    /// The image bytes could not be decoded.
    #[error("Image {image_num} ('{input}'): decode failed: {detail}")]
    Decode {
        image_num: usize,
        input: String,
        detail: String,
    },

    /// The OCR engine failed on this image.
    #[error("Image {image_num} ('{input}'): OCR failed: {detail}")]
    Ocr {
        image_num: usize,
        input: String,
        detail: String,
    },

    /// The OCR engine timed out on this image.
    #[error("Image {image_num} ('{input}'): OCR timed out after {secs}s")]
    Timeout {
        image_num: usize,
        input: String,
        secs: u64,
    },
}

impl ImageError {
    /// Downgrade a fatal error into a per-image error for batch reporting.
    pub fn from_fatal(image_num: usize, input: impl Into<String>, err: &Img2MdError) -> Self {
        let input = input.into();
        match err {
            Img2MdError::OcrTimeout { secs, .. } => ImageError::Timeout {
                image_num,
                input,
                secs: *secs,
            },
            Img2MdError::UnsupportedFormat { .. } | Img2MdError::DecodeFailed { .. } => {
                ImageError::Decode {
                    image_num,
                    input,
                    detail: err.to_string(),
                }
            }
            Img2MdError::OcrFailed { detail, .. } => ImageError::Ocr {
                image_num,
                input,
                detail: detail.clone(),
            },
            Img2MdError::OcrEngineUnavailable { .. } => ImageError::Ocr {
                image_num,
                input,
                detail: err.to_string(),
            },
            other => ImageError::Input {
                image_num,
                input,
                detail: other.to_string(),
            },
        }
    }

    /// 1-based position of the failed image in the batch.
    pub fn image_num(&self) -> usize {
        match self {
            ImageError::Input { image_num, .. }
            | ImageError::Decode { image_num, .. }
            | ImageError::Ocr { image_num, .. }
            | ImageError::Timeout { image_num, .. } => *image_num,
        }
    }
}
