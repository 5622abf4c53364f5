//! # edgequake-img2md
//!
//! Convert images of text (scans, photos, screenshots) to Markdown using OCR.
//!
//! OCR engines return a flat run of lines. This crate prepares the image so
//! the engine reads it well, then rebuilds a plausible document structure
//! from the text: shouting-case lines become headings, bullet lines become
//! list items, and the rest stays paragraph text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PNG / JPEG
//!  │
//!  ├─ 1. Input      resolve local file, download URL, or accept bytes
//!  ├─ 2. Decode     image crate (CPU-bound, spawn_blocking)
//!  ├─ 3. Normalise  luma + min/max contrast stretch to 0–255
//!  ├─ 4. OCR        tesseract CLI (timeout, killed on drop)
//!  ├─ 5. Structure  headings / lists / paragraphs, line by line
//!  └─ 6. Output     Markdown + raw text + metadata + timings
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2md::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // tesseract located via TESSERACT_CMD, PATH, or well-known locations
//!     let config = ConversionConfig::default();
//!     let output = convert("scan.png", &config).await?;
//!     if output.is_empty() {
//!         eprintln!("No text was detected in the image.");
//!     }
//!     println!("{}", output.markdown);
//!     Ok(())
//! }
//! ```
//!
//! The structure engine is usable on its own, without any image or OCR:
//!
//! ```rust
//! use edgequake_img2md::infer_markdown;
//!
//! assert_eq!(infer_markdown("HELLO WORLD"), "## HELLO WORLD");
//! assert_eq!(infer_markdown("OK"), "OK");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-img2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ImageSeparator};
pub use convert::{
    convert, convert_batch, convert_from_bytes, convert_image, convert_sync, convert_to_file,
    inspect,
};
pub use error::{ImageError, Img2MdError};
pub use output::{
    BatchOutput, BatchStats, ConversionOutput, ConversionStats, ImageMetadata, ImageResult,
};
pub use pipeline::normalize::normalize;
pub use pipeline::ocr::{OcrEngine, TesseractEngine};
pub use pipeline::structure::{infer_markdown, LineKind, StructureSummary};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, ImageStream};
