//! Offline integration tests for the full conversion pipeline.
//!
//! A scripted [`OcrEngine`] stands in for tesseract so every stage except
//! the external process runs for real: input resolution, decoding,
//! normalisation, structure inference, batching and progress events.

use async_trait::async_trait;
use edgequake_img2md::{
    convert, convert_batch, convert_from_bytes, convert_image, convert_stream, convert_sync,
    convert_to_file, inspect, ConversionConfig, ConversionProgressCallback, ImageError,
    ImageSeparator, Img2MdError, OcrEngine,
};
use futures::StreamExt;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test engines ─────────────────────────────────────────────────────────────

/// Returns fixed text and records the (min, max) pixel of every image seen.
struct RecordingEngine {
    text: String,
    seen: Mutex<Vec<(u8, u8)>>,
}

impl RecordingEngine {
    fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<(u8, u8)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl OcrEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    async fn recognize(&self, image: &GrayImage) -> Result<String, Img2MdError> {
        let range = image
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        self.seen.lock().unwrap().push(range);
        Ok(self.text.clone())
    }
}

/// Names each image after its width: width 1 → "SECTION A", 2 → "SECTION B", …
struct WidthEngine;

#[async_trait]
impl OcrEngine for WidthEngine {
    fn name(&self) -> &str {
        "width"
    }

    async fn recognize(&self, image: &GrayImage) -> Result<String, Img2MdError> {
        let letter = (b'A' + (image.width() as u8 - 1)) as char;
        Ok(format!("SECTION {letter}\nbody of {letter}\n"))
    }
}

struct FailingEngine;

#[async_trait]
impl OcrEngine for FailingEngine {
    fn name(&self) -> &str {
        "failing"
    }

    async fn recognize(&self, _image: &GrayImage) -> Result<String, Img2MdError> {
        Err(Img2MdError::OcrFailed {
            engine: "failing".into(),
            detail: "Error opening data file eng.traineddata".into(),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn config_with(engine: Arc<dyn OcrEngine>) -> ConversionConfig {
    ConversionConfig::builder().ocr_engine(engine).build().unwrap()
}

fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn write_png(dir: &Path, name: &str, img: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(img)).unwrap();
    path
}

/// A 1-row gray ramp from 50 to 200.
fn low_contrast_ramp() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(151, 1, |x, _| Luma([50 + x as u8])))
}

fn blank(width: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 4, Rgb([240, 240, 240])))
}

const RECEIPT_OCR: &str = "\n  INVOICE\n• item one\n• item two\nTotal due\n\x0c";

// ── Single image ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_image_builds_structure() {
    let engine = RecordingEngine::new(RECEIPT_OCR);
    let config = config_with(engine.clone());

    let output = convert_image(low_contrast_ramp(), &config).await.unwrap();

    assert_eq!(
        output.markdown,
        "## INVOICE\n- item one\n- item two\n\nTotal due"
    );
    assert_eq!(output.raw_text, RECEIPT_OCR);
    assert!(!output.is_empty());

    let s = &output.stats;
    assert_eq!(s.ocr_engine, "recording");
    assert_eq!(s.structure.headings, 1);
    assert_eq!(s.structure.list_items, 2);
    assert_eq!(s.structure.paragraphs, 1);
    assert_eq!(s.structure.list_exits, 1);
    assert_eq!(output.metadata.width, 151);
    assert_eq!(output.metadata.format, "raw");
}

#[tokio::test]
async fn test_engine_receives_stretched_image() {
    let engine = RecordingEngine::new("x");
    convert_image(low_contrast_ramp(), &config_with(engine.clone()))
        .await
        .unwrap();
    assert_eq!(engine.seen(), vec![(0, 255)]);
}

#[tokio::test]
async fn test_normalize_disabled_keeps_original_range() {
    let engine = RecordingEngine::new("x");
    let config = ConversionConfig::builder()
        .ocr_engine(engine.clone())
        .normalize(false)
        .build()
        .unwrap();
    let output = convert_image(low_contrast_ramp(), &config).await.unwrap();
    assert_eq!(engine.seen(), vec![(50, 200)]);
    assert!(!output.stats.normalized);
}

#[tokio::test]
async fn test_flat_image_is_degenerate_not_an_error() {
    let engine = RecordingEngine::new("");
    let output = convert_image(blank(8), &config_with(engine.clone()))
        .await
        .unwrap();
    assert!(output.stats.degenerate_image);
    assert_eq!(engine.seen(), vec![(0, 0)]);
}

#[tokio::test]
async fn test_no_text_gives_empty_markdown() {
    let engine = RecordingEngine::new(" \n\n\x0c");
    let output = convert_image(blank(8), &config_with(engine)).await.unwrap();
    assert!(output.is_empty());
    assert_eq!(output.markdown, "");
    assert_eq!(output.stats.text_chars, 0);
}

#[tokio::test]
async fn test_ocr_failure_is_fatal_for_single_image() {
    let err = convert_image(blank(8), &config_with(Arc::new(FailingEngine)))
        .await
        .unwrap_err();
    assert!(matches!(err, Img2MdError::OcrFailed { .. }), "got: {err}");
}

#[tokio::test]
async fn test_convert_from_bytes_png() {
    let engine = RecordingEngine::new("HELLO WORLD");
    let bytes = png_bytes(&low_contrast_ramp());
    let output = convert_from_bytes(&bytes, &config_with(engine))
        .await
        .unwrap();
    assert_eq!(output.markdown, "## HELLO WORLD");
    assert_eq!(output.metadata.format, "png");
    assert_eq!(output.metadata.byte_len, bytes.len() as u64);
}

#[tokio::test]
async fn test_convert_from_bytes_rejects_gif() {
    let engine = RecordingEngine::new("unused");
    let err = convert_from_bytes(b"GIF89a\x01\x00\x01\x00", &config_with(engine.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, Img2MdError::UnsupportedFormat { .. }));
    assert!(engine.seen().is_empty(), "OCR must not run on rejected input");
}

#[tokio::test]
async fn test_convert_path_with_front_matter() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "scan.png", &low_contrast_ramp());
    let config = ConversionConfig::builder()
        .ocr_engine(RecordingEngine::new("- already dashed"))
        .include_metadata(true)
        .build()
        .unwrap();

    let output = convert(path.to_str().unwrap(), &config).await.unwrap();
    assert!(output.markdown.starts_with("---\nsource: "), "got: {}", output.markdown);
    assert!(output.markdown.contains("width: 151\n"));
    assert!(output.markdown.ends_with("---\n\n- already dashed"));
}

#[tokio::test]
async fn test_convert_missing_file() {
    let err = convert("/no/such/scan.png", &config_with(RecordingEngine::new("")))
        .await
        .unwrap_err();
    assert!(matches!(err, Img2MdError::FileNotFound { .. }));
}

#[tokio::test]
async fn test_convert_to_file_ends_with_newline() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(dir.path(), "in.png", &low_contrast_ramp());
    let out = dir.path().join("out/result.md");

    let stats = convert_to_file(
        input.to_str().unwrap(),
        &out,
        &config_with(RecordingEngine::new("TITLE\ntext")),
    )
    .await
    .unwrap();

    assert_eq!(std::fs::read_to_string(&out).unwrap(), "## TITLE\ntext\n");
    assert_eq!(stats.structure.headings, 1);
}

#[test]
fn test_convert_sync_outside_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_png(dir.path(), "in.png", &low_contrast_ramp());
    let output = convert_sync(
        input.to_str().unwrap(),
        &config_with(RecordingEngine::new("OK")),
    )
    .unwrap();
    assert_eq!(output.markdown, "OK");
}

#[tokio::test]
async fn test_inspect_reads_metadata_without_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "photo.png", &blank(33));
    let meta = inspect(path.to_str().unwrap()).await.unwrap();
    assert_eq!((meta.width, meta.height), (33, 4));
    assert_eq!(meta.format, "png");
    assert_eq!(meta.color_type, "Rgb8");
}

// ── Batches ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_keeps_input_order_and_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", &blank(1));
    let bad = dir.path().join("notes.png");
    std::fs::write(&bad, b"plain text, not an image").unwrap();
    let c = write_png(dir.path(), "c.png", &blank(3));

    let config = ConversionConfig::builder()
        .ocr_engine(Arc::new(WidthEngine))
        .image_separator(ImageSeparator::HorizontalRule)
        .concurrency(3)
        .build()
        .unwrap();

    let batch = convert_batch(
        [a.to_str().unwrap(), bad.to_str().unwrap(), c.to_str().unwrap()],
        &config,
    )
    .await
    .unwrap();

    assert_eq!(
        batch.markdown,
        "## SECTION A\nbody of A\n\n---\n\n## SECTION C\nbody of C"
    );
    assert_eq!(batch.stats.total_images, 3);
    assert_eq!(batch.stats.processed_images, 2);
    assert_eq!(batch.stats.failed_images, 1);
    assert_eq!(
        batch.images.iter().map(|i| i.image_num).collect::<Vec<_>>(),
        vec![1, 3]
    );
    assert!(matches!(batch.errors[0], ImageError::Decode { image_num: 2, .. }));
    assert!(batch.into_result().is_err());
}

#[tokio::test]
async fn test_batch_front_matter_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", &blank(1));
    let b = write_png(dir.path(), "b.png", &blank(2));
    let config = ConversionConfig::builder()
        .ocr_engine(Arc::new(WidthEngine))
        .include_metadata(true)
        .build()
        .unwrap();

    let batch = convert_batch([a.to_str().unwrap(), b.to_str().unwrap()], &config)
        .await
        .unwrap();
    assert!(batch.markdown.starts_with("---\nimages: 2\n"));
    assert_eq!(batch.markdown.matches("---\n").count(), 2);
    assert!(batch.markdown.ends_with("## SECTION A\nbody of A\n\n## SECTION B\nbody of B"));
}

#[tokio::test]
async fn test_batch_all_failed() {
    let config = config_with(Arc::new(FailingEngine));
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", &blank(1));

    let err = convert_batch([a.to_str().unwrap(), "/missing.png"], &config)
        .await
        .unwrap_err();
    match err {
        Img2MdError::AllImagesFailed { total, .. } => assert_eq!(total, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let config = config_with(Arc::new(WidthEngine));
    let err = convert_batch(Vec::<String>::new(), &config).await.unwrap_err();
    assert!(matches!(err, Img2MdError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_stream_yields_every_image() {
    let dir = tempfile::tempdir().unwrap();
    let inputs: Vec<String> = (1..=4)
        .map(|w| {
            write_png(dir.path(), &format!("{w}.png"), &blank(w))
                .to_string_lossy()
                .into_owned()
        })
        .collect();

    let config = ConversionConfig::builder()
        .ocr_engine(Arc::new(WidthEngine))
        .concurrency(2)
        .build()
        .unwrap();

    let stream = convert_stream(inputs, &config).unwrap();
    let mut results: Vec<_> = stream.collect::<Vec<_>>().await;
    results.sort_by_key(|r| r.as_ref().map(|i| i.image_num).unwrap_or(0));

    assert_eq!(results.len(), 4);
    for (i, r) in results.iter().enumerate() {
        let image = r.as_ref().unwrap();
        let letter = (b'A' + i as u8) as char;
        assert_eq!(image.image_num, i + 1);
        assert!(image.output.markdown.starts_with(&format!("## SECTION {letter}")));
    }
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingCallback {
    started_with: AtomicUsize,
    image_starts: AtomicUsize,
    completes: AtomicUsize,
    errors: AtomicUsize,
    final_success: AtomicUsize,
}

impl ConversionProgressCallback for CountingCallback {
    fn on_conversion_start(&self, total_images: usize) {
        self.started_with.store(total_images, Ordering::SeqCst);
    }
    fn on_image_start(&self, _image_num: usize, _total: usize) {
        self.image_starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_image_complete(&self, _image_num: usize, _total: usize, _len: usize) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
    fn on_image_error(&self, _image_num: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_conversion_complete(&self, _total: usize, success: usize) {
        self.final_success.store(success, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_batch_progress_events() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", &blank(1));
    let b = write_png(dir.path(), "b.png", &blank(2));

    let cb = Arc::new(CountingCallback::default());
    let config = ConversionConfig::builder()
        .ocr_engine(Arc::new(WidthEngine))
        .progress_callback(cb.clone())
        .build()
        .unwrap();

    convert_batch(
        [a.to_str().unwrap(), "/missing.png", b.to_str().unwrap()],
        &config,
    )
    .await
    .unwrap();

    assert_eq!(cb.started_with.load(Ordering::SeqCst), 3);
    assert_eq!(cb.image_starts.load(Ordering::SeqCst), 3);
    assert_eq!(cb.completes.load(Ordering::SeqCst), 2);
    assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    assert_eq!(cb.final_success.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_single_image_progress_events() {
    let cb = Arc::new(CountingCallback::default());
    let config = ConversionConfig::builder()
        .ocr_engine(Arc::new(FailingEngine))
        .progress_callback(cb.clone())
        .build()
        .unwrap();

    let _ = convert_image(blank(2), &config).await;

    assert_eq!(cb.started_with.load(Ordering::SeqCst), 1);
    assert_eq!(cb.image_starts.load(Ordering::SeqCst), 1);
    assert_eq!(cb.completes.load(Ordering::SeqCst), 0);
    assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    assert_eq!(cb.final_success.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_conversion_future_is_send() {
    let engine = RecordingEngine::new("SPAWNED");
    let config = config_with(engine);
    let handle = tokio::spawn(async move { convert_image(blank(2), &config).await });
    let output = handle.await.unwrap().unwrap();
    assert_eq!(output.markdown, "## SPAWNED");
}
