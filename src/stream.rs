//! Streaming batch API: emit images as they complete.
//!
//! Unlike the eager [`crate::convert::convert_batch`], which returns only
//! after every image finishes, [`convert_stream`] yields one item per input
//! as soon as that image is done. Up to `config.concurrency` images are in
//! flight at once, so items arrive in completion order; sort by
//! `image_num` if order matters.

use crate::config::ConversionConfig;
use crate::convert::convert_one;
use crate::error::{ImageError, Img2MdError};
use crate::output::ImageResult;
use crate::pipeline::ocr;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of per-image results.
pub type ImageStream = Pin<Box<dyn Stream<Item = Result<ImageResult, ImageError>> + Send>>;

/// Convert several images, streaming results as they are ready.
///
/// Fires `on_conversion_start` immediately and `on_image_*` events as each
/// image runs. `on_conversion_complete` is left to the consumer, which is
/// the only party that knows when it stops polling.
///
/// # Returns
/// - `Ok(ImageStream)`: one `Result<ImageResult, ImageError>` per input
/// - `Err(Img2MdError)`: the batch cannot start (no inputs, no OCR engine)
///
/// # Example
/// ```rust,no_run
/// use edgequake_img2md::{convert_stream, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::default();
/// let mut stream = convert_stream(["page1.png", "page2.jpg"], &config)?;
/// while let Some(image) = stream.next().await {
///     match image {
///         Ok(r) => println!("Image {}: {} chars", r.image_num, r.output.markdown.len()),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn convert_stream<I, S>(inputs: I, config: &ConversionConfig) -> Result<ImageStream, Img2MdError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
    if inputs.is_empty() {
        return Err(Img2MdError::InvalidInput {
            input: String::new(),
        });
    }
    let total = inputs.len();
    info!("Starting batch conversion of {} images", total);

    // ── Get engine ───────────────────────────────────────────────────────
    let engine = ocr::resolve_engine(config)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total);
    }

    // ── Build the stream ─────────────────────────────────────────────────
    let concurrency = config.concurrency;
    let config_clone = config.clone();

    let s = stream::iter(inputs.into_iter().enumerate().map(move |(idx, input)| {
        let engine = Arc::clone(&engine);
        let cfg = config_clone.clone();
        async move {
            let image_num = idx + 1;
            if let Some(ref cb) = cfg.progress_callback {
                cb.on_image_start(image_num, total);
            }
            match convert_one(&input, &engine, &cfg).await {
                Ok(output) => {
                    if let Some(ref cb) = cfg.progress_callback {
                        cb.on_image_complete(image_num, total, output.markdown.len());
                    }
                    Ok(ImageResult { image_num, output })
                }
                Err(e) => {
                    warn!("Image {} ('{}') failed: {}", image_num, input, e);
                    if let Some(ref cb) = cfg.progress_callback {
                        cb.on_image_error(image_num, total, &e.to_string());
                    }
                    Err(ImageError::from_fatal(image_num, input, &e))
                }
            }
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}
