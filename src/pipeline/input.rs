//! Input resolution: turn a user-supplied path, URL or byte buffer into
//! validated image bytes.
//!
//! Only PNG and JPEG are accepted. The format is decided by magic bytes, not
//! by file extension, so a renamed GIF is rejected here with a readable
//! error instead of failing deep inside the decoder.

use crate::config::ConversionConfig;
use crate::error::Img2MdError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Source label used for in-memory inputs.
pub const MEMORY_SOURCE: &str = "<memory>";

/// Raster formats accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Png,
    Jpeg,
}

impl InputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            InputFormat::Png => "png",
            InputFormat::Jpeg => "jpeg",
        }
    }

    pub(crate) fn image_format(self) -> image::ImageFormat {
        match self {
            InputFormat::Png => image::ImageFormat::Png,
            InputFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// Validated input bytes ready for decoding.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// Path, URL or [`MEMORY_SOURCE`].
    pub source: String,
    pub format: InputFormat,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Identify the image format from the leading bytes.
pub fn detect_format(bytes: &[u8]) -> Option<InputFormat> {
    if bytes.starts_with(&PNG_MAGIC) {
        Some(InputFormat::Png)
    } else if bytes.starts_with(&JPEG_MAGIC) {
        Some(InputFormat::Jpeg)
    } else {
        None
    }
}

/// Resolve a path or URL to validated image bytes.
pub async fn resolve_input(
    input: &str,
    config: &ConversionConfig,
) -> Result<ResolvedInput, Img2MdError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Img2MdError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, config).await
    } else {
        resolve_local(input, config).await
    }
}

/// Validate an in-memory buffer (e.g. an upload) without touching disk.
pub fn from_bytes(
    source: impl Into<String>,
    bytes: Vec<u8>,
    config: &ConversionConfig,
) -> Result<ResolvedInput, Img2MdError> {
    let source = source.into();
    check_size(&source, bytes.len() as u64, config.max_input_bytes)?;
    let format = detect_format(&bytes).ok_or_else(|| Img2MdError::UnsupportedFormat {
        input: source.clone(),
        magic: bytes.iter().take(8).copied().collect(),
    })?;
    debug!("Accepted {} bytes of {} from {}", bytes.len(), format.as_str(), source);
    Ok(ResolvedInput {
        source,
        format,
        bytes,
    })
}

fn check_size(source: &str, size: u64, limit: u64) -> Result<(), Img2MdError> {
    if size > limit {
        return Err(Img2MdError::InputTooLarge {
            input: source.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Read a local file, checking size before loading it into memory.
async fn resolve_local(
    path_str: &str,
    config: &ConversionConfig,
) -> Result<ResolvedInput, Img2MdError> {
    let path = PathBuf::from(path_str);

    let meta = match tokio::fs::metadata(&path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Img2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Img2MdError::FileNotFound { path }),
    };
    if !meta.is_file() {
        return Err(Img2MdError::InvalidInput {
            input: path_str.to_string(),
        });
    }
    check_size(path_str, meta.len(), config.max_input_bytes)?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Img2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Img2MdError::FileNotFound { path }),
    };

    debug!("Resolved local image: {}", path.display());
    from_bytes(path_str, bytes, config)
}

/// Download a URL into memory.
async fn download_url(url: &str, config: &ConversionConfig) -> Result<ResolvedInput, Img2MdError> {
    info!("Downloading image from: {}", url);
    let timeout_secs = config.download_timeout_secs;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Img2MdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Img2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Img2MdError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Img2MdError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(len) = response.content_length() {
        check_size(url, len, config.max_input_bytes)?;
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            Img2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Img2MdError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    info!("Downloaded {} bytes", bytes.len());
    from_bytes(url, bytes.to_vec(), config)
}
