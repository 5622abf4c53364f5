//! Configuration types for image-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct carries every knob so a
//! config can be shared across the concurrent tasks of a batch and logged
//! as a whole.

use crate::error::Img2MdError;
use crate::pipeline::ocr::OcrEngine;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Highest tesseract page-segmentation mode (`--psm 0..=13`).
pub const MAX_PAGE_SEGMENTATION_MODE: u8 = 13;

/// Configuration for an image-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_img2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .language("eng+deu")
///     .ocr_timeout_secs(30)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.language, "eng+deu");
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Run the grayscale + contrast-stretch normaliser before OCR. Default: true.
    ///
    /// When disabled the image is only converted to 8-bit grayscale.
    pub normalize: bool,

    /// Tesseract language pack(s), e.g. `"eng"` or `"eng+deu"`. Default: `"eng"`.
    pub language: String,

    /// Tesseract page-segmentation mode (0–13). Default: None (engine default).
    pub page_segmentation_mode: Option<u8>,

    /// Explicit path to the tesseract executable.
    /// If None, located via `TESSERACT_CMD`, `PATH`, then well-known locations.
    pub tesseract_cmd: Option<PathBuf>,

    /// Pre-constructed OCR engine. Takes precedence over `tesseract_cmd`.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Per-image OCR timeout in seconds. Default: 60.
    ///
    /// The engine process is killed when the budget runs out.
    pub ocr_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Largest accepted input in bytes. Default: 200 MiB.
    pub max_input_bytes: u64,

    /// Number of images processed at once in a batch. Default: 4.
    ///
    /// Each in-flight image holds one OCR process; tesseract is CPU-bound,
    /// so values above the core count rarely help.
    pub concurrency: usize,

    /// Prepend YAML front-matter with image metadata. Default: false.
    pub include_metadata: bool,

    /// Separator between images in assembled batch output. Default: None.
    pub image_separator: ImageSeparator,

    /// Optional per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            language: "eng".to_string(),
            page_segmentation_mode: None,
            tesseract_cmd: None,
            ocr_engine: None,
            ocr_timeout_secs: 60,
            download_timeout_secs: 120,
            max_input_bytes: 200 * 1024 * 1024,
            concurrency: 4,
            include_metadata: false,
            image_separator: ImageSeparator::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("normalize", &self.normalize)
            .field("language", &self.language)
            .field("page_segmentation_mode", &self.page_segmentation_mode)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field(
                "ocr_engine",
                &self.ocr_engine.as_ref().map(|e| e.name().to_string()),
            )
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_input_bytes", &self.max_input_bytes)
            .field("concurrency", &self.concurrency)
            .field("include_metadata", &self.include_metadata)
            .field("image_separator", &self.image_separator)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn normalize(mut self, v: bool) -> Self {
        self.config.normalize = v;
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn page_segmentation_mode(mut self, psm: u8) -> Self {
        self.config.page_segmentation_mode = Some(psm);
        self
    }

    pub fn tesseract_cmd(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = Some(path.into());
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_input_bytes(mut self, bytes: u64) -> Self {
        self.config.max_input_bytes = bytes;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn image_separator(mut self, sep: ImageSeparator) -> Self {
        self.config.image_separator = sep;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Img2MdError> {
        let c = &self.config;
        if !is_valid_language(&c.language) {
            return Err(Img2MdError::InvalidConfig(format!(
                "Language must be one or more tesseract codes joined by '+', got '{}'",
                c.language
            )));
        }
        if let Some(psm) = c.page_segmentation_mode {
            if psm > MAX_PAGE_SEGMENTATION_MODE {
                return Err(Img2MdError::InvalidConfig(format!(
                    "Page segmentation mode must be 0–{MAX_PAGE_SEGMENTATION_MODE}, got {psm}"
                )));
            }
        }
        if c.ocr_timeout_secs == 0 {
            return Err(Img2MdError::InvalidConfig(
                "OCR timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_input_bytes == 0 {
            return Err(Img2MdError::InvalidConfig(
                "Maximum input size must be ≥ 1 byte".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(Img2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// `eng`, `chi_sim`, `eng+deu`: ASCII alphanumerics/underscores joined by `+`.
fn is_valid_language(lang: &str) -> bool {
    !lang.is_empty()
        && lang.split('+').all(|code| {
            !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How to separate images in assembled batch output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum ImageSeparator {
    /// No separator; images joined with "\n\n". (default)
    #[default]
    None,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with image number: "<!-- image N -->"
    Comment,
    /// Custom string inserted between images.
    Custom(String),
}

impl ImageSeparator {
    /// Render the separator placed before image `image_num` (1-based).
    pub fn render(&self, image_num: usize) -> String {
        match self {
            ImageSeparator::None => "\n\n".to_string(),
            ImageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            ImageSeparator::Comment => format!("\n\n<!-- image {} -->\n\n", image_num),
            ImageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}
