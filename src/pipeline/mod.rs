//! Pipeline stages for image-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step and can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ decode ──▶ normalize ──▶ ocr ──▶ structure
//! (path/URL)  (image)   (grayscale)  (text)  (markdown)
//! ```
//!
//! 1. [`input`]: read a path, download a URL or accept a buffer; checks
//!    size and PNG/JPEG magic bytes
//! 2. [`decode`]: decode to `DynamicImage`; runs in `spawn_blocking`
//! 3. [`normalize`]: luma conversion and min/max contrast stretch
//! 4. [`ocr`]: the only stage that leaves the process (tesseract)
//! 5. [`structure`]: line-by-line heading/list/paragraph inference
//!
//! `normalize` and `structure` are pure and synchronous.

pub mod decode;
pub mod input;
pub mod normalize;
pub mod ocr;
pub mod structure;
