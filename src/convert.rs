//! Eager conversion entry points.
//!
//! Single images go through [`convert`], [`convert_from_bytes`] or
//! [`convert_image`]; several images through [`convert_batch`], which waits
//! for every image and assembles one document. Use
//! [`crate::stream::convert_stream`] instead to receive images as they
//! finish.

use crate::config::ConversionConfig;
use crate::error::{ImageError, Img2MdError};
use crate::output::{
    BatchOutput, BatchStats, ConversionOutput, ConversionStats, ImageMetadata, ImageResult,
};
use crate::pipeline::decode::{self, DecodedImage};
use crate::pipeline::input::{self, MEMORY_SOURCE};
use crate::pipeline::normalize;
use crate::pipeline::ocr::{self, OcrEngine};
use crate::pipeline::structure::{self, StructureSummary};
use futures::StreamExt;
use image::DynamicImage;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert an image file or URL to Markdown.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`: Local file path or HTTP/HTTPS URL to a PNG or JPEG image
/// * `config`: Conversion configuration
///
/// # Returns
/// `Ok(ConversionOutput)` on success. An image without any text is still a
/// success; check [`ConversionOutput::is_empty`].
///
/// # Errors
/// - File not found / permission denied / download failed
/// - Not a PNG or JPEG, or undecodable
/// - OCR engine missing, failing or timing out
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2MdError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let engine = ocr::resolve_engine(config)?;
    track_single(config, convert_one(input_str, &engine, config)).await
}

/// Convert image bytes in memory (e.g. an upload) to Markdown.
///
/// # Example
/// ```rust,no_run
/// use edgequake_img2md::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("receipt.jpg")?;
/// let config = ConversionConfig::default();
/// let output = convert_from_bytes(&bytes, &config).await?;
/// println!("{}", output.markdown);
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2MdError> {
    let engine = ocr::resolve_engine(config)?;
    track_single(config, async {
        let start = Instant::now();
        let resolved = input::from_bytes(MEMORY_SOURCE, bytes.to_vec(), config)?;
        let decode_start = Instant::now();
        let decoded = decode::decode(resolved).await?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;
        process_image(decoded, &engine, config, start, decode_ms).await
    })
    .await
}

/// Convert an already-decoded image to Markdown.
pub async fn convert_image(
    image: DynamicImage,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2MdError> {
    let engine = ocr::resolve_engine(config)?;
    let metadata = decode::metadata_for(&image, MEMORY_SOURCE);
    let decoded = DecodedImage { image, metadata };
    track_single(
        config,
        process_image(decoded, &engine, config, Instant::now(), 0),
    )
    .await
}

/// Convert an image and write the Markdown directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files. The
/// written file always ends with a newline.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Img2MdError> {
    let output = convert(input_str, config).await?;
    let mut contents = output.markdown;
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    write_atomic(output_path.as_ref(), &contents).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Img2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Read image metadata without running OCR.
///
/// Does not require tesseract.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<ImageMetadata, Img2MdError> {
    let resolved = input::resolve_input(input_str.as_ref(), &ConversionConfig::default()).await?;
    Ok(decode::decode(resolved).await?.metadata)
}

/// Convert several images and assemble them into one document.
///
/// Images run concurrently (`config.concurrency`); the assembled Markdown
/// keeps input order, joined with `config.image_separator`. Images without
/// text are counted but contribute nothing to the document.
///
/// # Returns
/// `Ok(BatchOutput)` when at least one image converted; per-image failures
/// are listed in `errors`.
///
/// # Errors
/// [`Img2MdError::AllImagesFailed`] when no image converted, plus any error
/// that prevents the batch from starting (empty input list, no OCR engine).
pub async fn convert_batch<I, S>(
    inputs: I,
    config: &ConversionConfig,
) -> Result<BatchOutput, Img2MdError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let start = Instant::now();

    // Front-matter is written once for the whole document below.
    let mut image_config = config.clone();
    image_config.include_metadata = false;

    let stream = crate::stream::convert_stream(inputs, &image_config)?;
    let results: Vec<Result<ImageResult, ImageError>> = stream.collect().await;
    let total = results.len();

    let mut images = Vec::with_capacity(total);
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(image) => images.push(image),
            Err(e) => errors.push(e),
        }
    }
    images.sort_by_key(|i| i.image_num);
    errors.sort_by_key(|e| e.image_num());

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total, images.len());
    }

    if images.is_empty() {
        let first_error = errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Img2MdError::AllImagesFailed { total, first_error });
    }

    let mut markdown = String::new();
    if config.include_metadata {
        markdown.push_str(&format_batch_front_matter(&images));
    }
    markdown.push_str(&assemble_batch(&images, config));

    let stats = BatchStats {
        total_images: total,
        processed_images: images.len(),
        failed_images: errors.len(),
        empty_images: images.iter().filter(|i| i.output.is_empty()).count(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} images, {} without text, {}ms total",
        stats.processed_images, stats.total_images, stats.empty_images, stats.total_duration_ms
    );

    Ok(BatchOutput {
        markdown,
        images,
        errors,
        stats,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve, decode and convert one path or URL.
pub(crate) async fn convert_one(
    input_str: &str,
    engine: &Arc<dyn OcrEngine>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2MdError> {
    let start = Instant::now();

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config).await?;

    // ── Step 2: Decode ───────────────────────────────────────────────────
    let decode_start = Instant::now();
    let decoded = decode::decode(resolved).await?;
    let decode_ms = decode_start.elapsed().as_millis() as u64;

    process_image(decoded, engine, config, start, decode_ms).await
}

/// Normalise, OCR and structure one decoded image.
async fn process_image(
    decoded: DecodedImage,
    engine: &Arc<dyn OcrEngine>,
    config: &ConversionConfig,
    start: Instant,
    decode_duration_ms: u64,
) -> Result<ConversionOutput, Img2MdError> {
    let DecodedImage { image, metadata } = decoded;

    // ── Step 3: Normalise ────────────────────────────────────────────────
    let normalize_start = Instant::now();
    let do_normalize = config.normalize;
    let (gray, degenerate) = tokio::task::spawn_blocking(move || {
        if do_normalize {
            let (gray, stats) = normalize::normalize_with_stats(&image);
            (gray, stats.degenerate)
        } else {
            (image.to_luma8(), false)
        }
    })
    .await
    .map_err(|e| Img2MdError::Internal(format!("Normalise task panicked: {}", e)))?;
    let normalize_duration_ms = normalize_start.elapsed().as_millis() as u64;
    if degenerate {
        debug!("{}: flat image, normalised to zeros", metadata.source);
    }

    // ── Step 4: OCR ──────────────────────────────────────────────────────
    let ocr_start = Instant::now();
    let raw_text = engine.recognize(&gray).await?;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    // ── Step 5: Structure ────────────────────────────────────────────────
    // Trimming drops surrounding blank lines and tesseract's trailing form feed.
    let text = raw_text.trim();
    if text.is_empty() {
        warn!("No text detected in {}", metadata.source);
    }
    let lines = structure::infer_lines(text);
    let structure = StructureSummary::from_lines(&lines);
    let body = structure::render(&lines);

    let markdown = if config.include_metadata {
        format!("{}{}", format_yaml_front_matter(&metadata), body)
    } else {
        body
    };

    let stats = ConversionStats {
        ocr_engine: engine.name().to_string(),
        normalized: config.normalize,
        degenerate_image: degenerate,
        text_chars: text.chars().count(),
        structure,
        decode_duration_ms,
        normalize_duration_ms,
        ocr_duration_ms,
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Converted {}: {} headings, {} list items, {} paragraph lines in {}ms",
        metadata.source,
        stats.structure.headings,
        stats.structure.list_items,
        stats.structure.paragraphs,
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        markdown,
        raw_text,
        metadata,
        stats,
    })
}

/// Fire single-image progress events (total = 1) around `fut`.
async fn track_single<F>(config: &ConversionConfig, fut: F) -> Result<ConversionOutput, Img2MdError>
where
    F: Future<Output = Result<ConversionOutput, Img2MdError>>,
{
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_conversion_start(1);
        cb.on_image_start(1, 1);
    }
    let result = fut.await;
    if let Some(cb) = cb {
        match &result {
            Ok(output) => cb.on_image_complete(1, 1, output.markdown.len()),
            Err(e) => cb.on_image_error(1, 1, &e.to_string()),
        }
        cb.on_conversion_complete(1, usize::from(result.is_ok()));
    }
    result
}

/// Join converted images in order, skipping those without text.
fn assemble_batch(images: &[ImageResult], config: &ConversionConfig) -> String {
    let mut parts: Vec<String> = Vec::new();
    for image in images.iter().filter(|i| !i.output.markdown.is_empty()) {
        if !parts.is_empty() {
            parts.push(config.image_separator.render(image.image_num));
        }
        parts.push(image.output.markdown.clone());
    }
    parts.join("")
}

/// Write `contents` to `path` via a sibling temp file and rename.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), Img2MdError> {
    let write_err = |e: std::io::Error| Img2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Format image metadata as YAML front matter.
fn format_yaml_front_matter(meta: &ImageMetadata) -> String {
    let mut yaml = String::from("---\n");
    yaml.push_str(&format!("source: {}\n", yaml_quote(&meta.source)));
    yaml.push_str(&format!("format: {}\n", yaml_quote(&meta.format)));
    yaml.push_str(&format!("width: {}\n", meta.width));
    yaml.push_str(&format!("height: {}\n", meta.height));
    yaml.push_str(&format!("color_type: {}\n", yaml_quote(&meta.color_type)));
    yaml.push_str("---\n\n");
    yaml
}

/// Front matter for an assembled batch: image count and sources in order.
fn format_batch_front_matter(images: &[ImageResult]) -> String {
    let mut yaml = String::from("---\n");
    yaml.push_str(&format!("images: {}\n", images.len()));
    yaml.push_str("sources:\n");
    for image in images {
        yaml.push_str(&format!("  - {}\n", yaml_quote(&image.output.metadata.source)));
    }
    yaml.push_str("---\n\n");
    yaml
}

fn yaml_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
