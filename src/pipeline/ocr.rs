//! OCR: normalised grayscale image → raw text.
//!
//! Character recognition is delegated to an external engine behind the
//! [`OcrEngine`] trait. The built-in [`TesseractEngine`] shells out to the
//! `tesseract` CLI; callers can inject any other engine through
//! [`crate::config::ConversionConfigBuilder::ocr_engine`].
//!
//! ## Process handling
//!
//! The normalised image is written as PNG to a temp file, then
//! `tesseract <png> stdout -l <lang> [--psm N]` runs under
//! `tokio::time::timeout`. The child is spawned with `kill_on_drop`, so a
//! timed-out or cancelled conversion does not leave a stray process behind.

use crate::config::ConversionConfig;
use crate::error::Img2MdError;
use async_trait::async_trait;
use image::GrayImage;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// An OCR engine that turns an image into plain text.
///
/// Implementations must be `Send + Sync`; one engine instance is shared by
/// every image of a batch.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short identifier used in logs, stats and errors (e.g. `"tesseract"`).
    fn name(&self) -> &str;

    /// Recognise all text in `image`, lines separated by `'\n'`.
    async fn recognize(&self, image: &GrayImage) -> Result<String, Img2MdError>;
}

/// Pick the engine for a conversion.
///
/// 1. **Pre-built engine** (`config.ocr_engine`): used as-is.
/// 2. **Tesseract**: at `config.tesseract_cmd` if set, otherwise located
///    via `TESSERACT_CMD`, `PATH` and well-known install directories.
pub fn resolve_engine(config: &ConversionConfig) -> Result<Arc<dyn OcrEngine>, Img2MdError> {
    if let Some(ref engine) = config.ocr_engine {
        return Ok(Arc::clone(engine));
    }
    Ok(Arc::new(TesseractEngine::from_config(config)?))
}

/// OCR via the `tesseract` command-line program.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: PathBuf,
    language: String,
    page_segmentation_mode: Option<u8>,
    timeout: Duration,
}

impl TesseractEngine {
    pub const NAME: &'static str = "tesseract";

    /// Build an engine for an explicit executable path.
    pub fn new(command: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            page_segmentation_mode: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_page_segmentation_mode(mut self, psm: Option<u8>) -> Self {
        self.page_segmentation_mode = psm;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build an engine from conversion settings, locating tesseract if needed.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Img2MdError> {
        let command = match config.tesseract_cmd {
            Some(ref path) => path.clone(),
            None => tesseract_locate::locate_tesseract().map_err(|e| {
                Img2MdError::OcrEngineUnavailable {
                    engine: Self::NAME.to_string(),
                    hint: format!(
                        "{e}\nInstall tesseract (apt install tesseract-ocr, brew install tesseract) \
                         or set TESSERACT_CMD=/path/to/tesseract."
                    ),
                }
            })?,
        };
        debug!("Using tesseract at {}", command.display());

        Ok(Self::new(command, config.language.clone())
            .with_page_segmentation_mode(config.page_segmentation_mode)
            .with_timeout(Duration::from_secs(config.ocr_timeout_secs)))
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Arguments for one run, reading `image_path` and writing to stdout.
    pub fn build_args(&self, image_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            image_path.as_os_str().to_owned(),
            "stdout".into(),
            "-l".into(),
            self.language.clone().into(),
        ];
        if let Some(psm) = self.page_segmentation_mode {
            args.push("--psm".into());
            args.push(psm.to_string().into());
        }
        args
    }

    fn failed(&self, detail: impl Into<String>) -> Img2MdError {
        Img2MdError::OcrFailed {
            engine: Self::NAME.to_string(),
            detail: detail.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn recognize(&self, image: &GrayImage) -> Result<String, Img2MdError> {
        let start = Instant::now();

        // PNG encoding is CPU work; keep it off the async workers.
        let owned = image.clone();
        let tmp = tokio::task::spawn_blocking(move || write_png(&owned))
            .await
            .map_err(|e| Img2MdError::Internal(format!("PNG encode task panicked: {}", e)))??;

        let args = self.build_args(tmp.path());
        debug!("Running {} {:?}", self.command.display(), args);

        let child = tokio::process::Command::new(&self.command)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Img2MdError::OcrEngineUnavailable {
                    engine: Self::NAME.to_string(),
                    hint: format!("'{}' could not be executed: {}", self.command.display(), e),
                });
            }
            Ok(Err(e)) => return Err(self.failed(format!("failed to start: {e}"))),
            Err(_) => {
                return Err(Img2MdError::OcrTimeout {
                    engine: Self::NAME.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failed(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        info!(
            "{}: {} chars in {}ms",
            Self::NAME,
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

/// Encode a grayscale image to a PNG temp file, deleted when dropped.
fn write_png(image: &GrayImage) -> Result<tempfile::NamedTempFile, Img2MdError> {
    let tmp = tempfile::Builder::new()
        .prefix("img2md-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| Img2MdError::Internal(format!("tempfile: {e}")))?;
    image
        .save_with_format(tmp.path(), image::ImageFormat::Png)
        .map_err(|e| Img2MdError::Internal(format!("Failed to write OCR input PNG: {e}")))?;
    Ok(tmp)
}
