//! Downscaled render preview for terminal display.
//!
//! The preview is 75% of the render resolution, aspect preserved, clamped to
//! the space available. Terminal cells draw two pixel rows each using the
//! upper half block, so the vertical pixel budget is twice the row count.

use image::RgbImage;
use image::imageops::FilterType;

use crate::artifact::{ArtifactError, ArtifactResult, RenderArtifact};

/// Fraction of the render resolution shown in the review surface
pub const PREVIEW_SCALE: f64 = 0.75;

/// Preview pixel size for a resolution, bounded by `(max_w, max_h)`
pub fn preview_size(resolution: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (w, h) = (resolution.0.max(1) as f64, resolution.1.max(1) as f64);
    let (max_w, max_h) = (bounds.0.max(1) as f64, bounds.1.max(1) as f64);

    let scale = PREVIEW_SCALE.min(max_w / w).min(max_h / h);
    let pw = (w * scale).round().max(1.0) as u32;
    let ph = (h * scale).round().max(1.0) as u32;
    (pw.min(bounds.0.max(1)), ph.min(bounds.1.max(1)))
}

/// Pixel budget for a terminal of `cols` x `rows`, leaving `reserved_rows`
/// for the tab bar and footer
pub fn terminal_bounds(cols: u16, rows: u16, reserved_rows: u16) -> (u32, u32) {
    let usable_rows = rows.saturating_sub(reserved_rows).max(1);
    (cols.max(1) as u32, usable_rows as u32 * 2)
}

pub fn load_preview(artifact: &RenderArtifact, bounds: (u32, u32)) -> ArtifactResult<RgbImage> {
    let img = image::open(&artifact.path).map_err(|source| ArtifactError::Decode {
        path: artifact.path.clone(),
        source,
    })?;
    let (w, h) = preview_size((artifact.width, artifact.height), bounds);
    Ok(img.resize_exact(w, h, FilterType::Triangle).to_rgb8())
}

/// A terminal cell: colour of the upper and the lower pixel
pub type HalfBlock = ([u8; 3], [u8; 3]);

/// Pair up pixel rows into cells. An odd last row gets a black lower half.
pub fn half_block_rows(img: &RgbImage) -> Vec<Vec<HalfBlock>> {
    let (w, h) = img.dimensions();
    (0..h)
        .step_by(2)
        .map(|y| {
            (0..w)
                .map(|x| {
                    let top = img.get_pixel(x, y).0;
                    let bottom = if y + 1 < h {
                        img.get_pixel(x, y + 1).0
                    } else {
                        [0, 0, 0]
                    };
                    (top, bottom)
                })
                .collect()
        })
        .collect()
}
