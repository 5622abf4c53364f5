//! CLI binary for edgequake-img2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_img2md::{
    convert, convert_batch, convert_to_file, inspect, ConversionConfig,
    ConversionProgressCallback, ImageSeparator, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Shown when OCR finds nothing in an image.
const NO_TEXT_WARNING: &str = "No text was detected in the image. Please try another image.";

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per image.
/// Images may finish out of order when several run at once.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-image wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose length is set by `on_conversion_start`.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading images…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("OCR");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, image_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&image_num)
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_images: usize) {
        self.activate_bar(total_images);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Starting OCR of {total_images} image(s)…"))
        ));
    }

    fn on_image_start(&self, image_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(image_num, Instant::now());
        self.bar.set_message(format!("image {image_num}"));
    }

    fn on_image_complete(&self, image_num: usize, total: usize, markdown_len: usize) {
        let secs = self.elapsed_secs(image_num);
        let size = if markdown_len == 0 {
            yellow("no text")
        } else {
            dim(&format!("{markdown_len:>5} chars"))
        };
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            image_num,
            total,
            size,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, image_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(image_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // First line only, truncated to keep output tidy.
        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}  {}",
            red("✗"),
            image_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_images: usize, success_count: usize) {
        let failed = total_images.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} image(s) converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images converted  ({} failed)",
                if failed == total_images {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  img2md scan.png

  # Convert to file
  img2md receipt.jpg -o receipt.md

  # Several images into one document, separated by rules
  img2md page1.png page2.png page3.png --separator hr -o book.md

  # Convert from URL
  img2md https://example.com/whiteboard.jpg

  # German text, single uniform block of text
  img2md --lang deu --psm 6 brief.png

  # Show the raw OCR text instead of Markdown
  img2md --raw scan.png

  # Inspect image metadata (no OCR)
  img2md --inspect-only scan.png

  # JSON output with metadata and timings
  img2md --json --metadata scan.png > output.json

HOW TEXT BECOMES MARKDOWN:
  ALL-CAPS lines (3+ chars)         →  ## Heading
  Lines starting with • - * ○       →  - list item
  First normal line after a list    →  blank line, then paragraph
  Everything else                   →  unchanged

ENVIRONMENT VARIABLES:
  TESSERACT_CMD           Path to the tesseract executable
  IMG2MD_LANG             Default OCR language(s), e.g. eng+deu
  RUST_LOG                Override log filter (e.g. edgequake_img2md=debug)

SETUP:
  1. Install tesseract:  apt install tesseract-ocr   |   brew install tesseract
  2. Convert:            img2md scan.png -o scan.md

  Supported input formats: PNG, JPG, JPEG.
"#;

/// Convert images of text to Markdown using OCR.
#[derive(Parser, Debug)]
#[command(
    name = "img2md",
    version,
    about = "Convert images of text to Markdown using OCR",
    long_about = "Convert PNG and JPEG images (local files or URLs) to Markdown. Each image is \
normalised to contrast-stretched grayscale, read with tesseract, and the text is rebuilt into \
headings, lists and paragraphs.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image paths or HTTP/HTTPS URLs (PNG, JPG, JPEG).
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "IMG2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Tesseract language pack(s), e.g. eng or eng+deu.
    #[arg(long = "lang", env = "IMG2MD_LANG", default_value = "eng")]
    language: String,

    /// Tesseract page-segmentation mode (0–13).
    #[arg(long, env = "IMG2MD_PSM",
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: Option<u8>,

    /// Path to the tesseract executable (default: auto-detect).
    #[arg(long, env = "IMG2MD_TESSERACT")]
    tesseract: Option<PathBuf>,

    /// Skip grayscale contrast stretching before OCR.
    #[arg(long, env = "IMG2MD_NO_NORMALIZE")]
    no_normalize: bool,

    /// Per-image OCR timeout in seconds.
    #[arg(long, env = "IMG2MD_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "IMG2MD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Number of images processed at once.
    #[arg(short, long, env = "IMG2MD_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Image separator: none, hr, comment, or custom string.
    #[arg(long, env = "IMG2MD_SEPARATOR", default_value = "none")]
    separator: String,

    /// Prepend YAML front-matter with image metadata.
    #[arg(long, env = "IMG2MD_METADATA")]
    metadata: bool,

    /// Output structured JSON instead of Markdown.
    #[arg(long, env = "IMG2MD_JSON", conflicts_with = "raw")]
    json: bool,

    /// Output the raw OCR text instead of Markdown.
    #[arg(long, env = "IMG2MD_RAW")]
    raw: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMG2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Print image metadata only, no OCR.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are noise while the progress bar is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        return inspect_all(&cli).await;
    }

    // ── Ensure tesseract is available ────────────────────────────────────
    let tesseract = preflight_tesseract(&cli)?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, tesseract, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    if cli.inputs.len() == 1 {
        convert_single(&cli, &config, show_progress).await
    } else {
        convert_many(&cli, &config, show_progress).await
    }
}

/// Convert one image; Markdown to file goes through the atomic writer.
async fn convert_single(cli: &Cli, config: &ConversionConfig, show_progress: bool) -> Result<()> {
    let input = &cli.inputs[0];

    if let (Some(output_path), false, false) = (cli.output.as_ref(), cli.json, cli.raw) {
        let stats = convert_to_file(input, output_path, config)
            .await
            .with_context(|| format!("Conversion of '{input}' failed"))?;
        if !cli.quiet {
            if stats.text_chars == 0 {
                warn_no_text(None);
            }
            eprintln!(
                "{}  {} lines  {}ms  →  {}",
                green("✔"),
                stats.structure.lines_out,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    let output = convert(input, config)
        .await
        .with_context(|| format!("Conversion of '{input}' failed"))?;

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else if cli.raw {
        output.raw_text.trim().to_string()
    } else {
        output.markdown.clone()
    };
    emit(cli.output.as_deref(), &rendered).await?;

    if !cli.quiet {
        if output.is_empty() {
            warn_no_text(None);
        }
        if !show_progress {
            eprintln!(
                "Converted {} in {}ms ({} headings, {} list items)",
                output.metadata.source,
                output.stats.total_duration_ms,
                output.stats.structure.headings,
                output.stats.structure.list_items,
            );
        }
    }
    Ok(())
}

/// Convert several images into one document.
async fn convert_many(cli: &Cli, config: &ConversionConfig, show_progress: bool) -> Result<()> {
    let batch = convert_batch(cli.inputs.iter().cloned(), config)
        .await
        .context("Conversion failed")?;

    let rendered = if cli.json {
        serde_json::to_string_pretty(&batch).context("Failed to serialise output")?
    } else if cli.raw {
        batch
            .images
            .iter()
            .map(|i| i.output.raw_text.trim())
            .collect::<Vec<_>>()
            .join("\n\n")
    } else {
        batch.markdown.clone()
    };
    emit(cli.output.as_deref(), &rendered).await?;

    if !cli.quiet {
        for image in batch.images.iter().filter(|i| i.output.is_empty()) {
            warn_no_text(Some(&image.output.metadata.source));
        }
        if !show_progress {
            for error in &batch.errors {
                eprintln!("{} {}", red("✗"), error);
            }
            eprintln!(
                "Converted {}/{} images in {}ms",
                batch.stats.processed_images, batch.stats.total_images, batch.stats.total_duration_ms
            );
        }
        if let Some(ref path) = cli.output {
            eprintln!("   →  {}", bold(&path.display().to_string()));
        }
    }
    Ok(())
}

/// Print metadata for every input without running OCR.
async fn inspect_all(cli: &Cli) -> Result<()> {
    let mut all = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let meta = inspect(input)
            .await
            .with_context(|| format!("Failed to inspect '{input}'"))?;
        all.push(meta);
    }

    if cli.json {
        let json = if all.len() == 1 {
            serde_json::to_string_pretty(&all[0])
        } else {
            serde_json::to_string_pretty(&all)
        };
        println!("{}", json.context("Failed to serialize metadata")?);
        return Ok(());
    }

    for (i, meta) in all.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("File:         {}", meta.source);
        println!("Format:       {}", meta.format);
        println!("Dimensions:   {} x {} px", meta.width, meta.height);
        println!("Color type:   {}", meta.color_type);
        println!("Size:         {} bytes", meta.byte_len);
    }
    Ok(())
}

/// Locate tesseract and check that it runs before any image is read.
fn preflight_tesseract(cli: &Cli) -> Result<PathBuf> {
    let path = match cli.tesseract {
        Some(ref p) => p.clone(),
        None => tesseract_locate::locate_tesseract().context(
            "tesseract not found. Install it (apt install tesseract-ocr, brew install tesseract) \
             or pass --tesseract /path/to/tesseract",
        )?,
    };
    let version = tesseract_locate::tesseract_version(&path)
        .with_context(|| format!("'{}' is not a working tesseract", path.display()))?;
    if !cli.quiet {
        eprintln!(
            "{}",
            dim(&format!("Using tesseract {} at {}", version, path.display()))
        );
    }
    Ok(path)
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    cli: &Cli,
    tesseract: PathBuf,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .normalize(!cli.no_normalize)
        .language(cli.language.clone())
        .tesseract_cmd(tesseract)
        .ocr_timeout_secs(cli.ocr_timeout)
        .download_timeout_secs(cli.download_timeout)
        .concurrency(cli.concurrency)
        .image_separator(parse_separator(&cli.separator))
        .include_metadata(cli.metadata);

    if let Some(psm) = cli.psm {
        builder = builder.page_segmentation_mode(psm);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write to `path`, or to stdout with a trailing newline.
async fn emit(path: Option<&Path>, contents: &str) -> Result<()> {
    let mut contents = contents.to_string();
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    match path {
        Some(path) => tokio::fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(contents.as_bytes())
                .context("Failed to write to stdout")
        }
    }
}

fn warn_no_text(source: Option<&str>) {
    match source {
        Some(s) => eprintln!("{} {}: {}", yellow("⚠"), s, NO_TEXT_WARNING),
        None => eprintln!("{} {}", yellow("⚠"), NO_TEXT_WARNING),
    }
}

/// Parse `--separator` string into `ImageSeparator`.
fn parse_separator(s: &str) -> ImageSeparator {
    match s.to_lowercase().as_str() {
        "none" => ImageSeparator::None,
        "hr" | "---" => ImageSeparator::HorizontalRule,
        "comment" => ImageSeparator::Comment,
        _ => ImageSeparator::Custom(s.to_string()),
    }
}
