//! Image normalisation: any colour mode → contrast-stretched grayscale.
//!
//! OCR engines read dark glyphs on a light background best when the full
//! 0–255 range is used. Phone photos of paper rarely do: the "white" page is
//! grey and the "black" ink is dark grey. This stage computes perceptual luma
//! and stretches it linearly so the darkest pixel becomes 0 and the lightest
//! becomes 255.
//!
//! ## Flat images
//!
//! A single-colour image has `max == min` luma, which would divide by zero.
//! Such images normalise to all-zero output of the same size.

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

/// Luma weights for R, G, B.
pub const LUMA_WEIGHTS: [f64; 3] = [0.2989, 0.5870, 0.1140];

/// What the normaliser observed about one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizeStats {
    pub width: u32,
    pub height: u32,
    pub min_luma: f64,
    pub max_luma: f64,
    /// `true` when the image had no luma range and was mapped to all zeros.
    pub degenerate: bool,
}

/// Normalise an image for OCR.
///
/// The result has the same width and height as `image`, one 8-bit channel,
/// and (unless the image is flat) a minimum of 0 and a maximum of 255.
pub fn normalize(image: &DynamicImage) -> GrayImage {
    normalize_with_stats(image).0
}

/// Like [`normalize`], also returning the luma range that was stretched.
pub fn normalize_with_stats(image: &DynamicImage) -> (GrayImage, NormalizeStats) {
    // Palette, gray+alpha and 16-bit inputs all go through RGB8 first.
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let luma = luminance(&rgb);

    let (min, max) = luma
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &l| {
            (lo.min(l), hi.max(l))
        });
    let range = max - min;
    let degenerate = luma.is_empty() || range <= 0.0;

    let stats = NormalizeStats {
        width,
        height,
        min_luma: if luma.is_empty() { 0.0 } else { min },
        max_luma: if luma.is_empty() { 0.0 } else { max },
        degenerate,
    };

    if degenerate {
        return (GrayImage::new(width, height), stats);
    }

    let out = GrayImage::from_fn(width, height, |x, y| {
        let l = luma[(y as usize) * (width as usize) + x as usize];
        // Truncating cast; the value is already within 0.0..=255.0.
        Luma([((l - min) / range * 255.0) as u8])
    });

    (out, stats)
}

/// Per-pixel luma of an RGB image, row-major.
pub fn luminance(rgb: &RgbImage) -> Vec<f64> {
    let [wr, wg, wb] = LUMA_WEIGHTS;
    rgb.pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            wr * f64::from(r) + wg * f64::from(g) + wb * f64::from(b)
        })
        .collect()
}
