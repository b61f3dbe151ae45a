//! Pixel template matching: slide a reference image over a screenshot
//! and report the best placement above a confidence threshold.

use crate::error::{UiError, UiResult};
use crate::types::Point;
use image::{GenericImageView, Rgba};
use std::path::Path;

pub const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Per-channel tolerance when comparing pixels. Screenshot encoders
/// and font antialiasing shift channels slightly between captures.
const RGB_TOLERANCE: u8 = 16;

/// Step between candidate placements. 1 is exhaustive; larger values
/// trade accuracy for speed on big screens.
const STRIDE: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct TemplateMatch {
    pub center: Point,
    pub confidence: f32,
}

fn pixel_close(a: Rgba<u8>, b: Rgba<u8>) -> bool {
    a.0.iter()
        .take(3)
        .zip(b.0.iter().take(3))
        .all(|(x, y)| x.abs_diff(*y) <= RGB_TOLERANCE)
}

/// Fraction of template pixels matching at placement (ox, oy).
/// Samples a grid rather than every pixel for large templates.
fn score_at(
    screen: &image::DynamicImage,
    template: &image::DynamicImage,
    ox: u32,
    oy: u32,
) -> f32 {
    let (tw, th) = template.dimensions();
    let sample = ((tw * th) / 4096).max(1);
    let mut matched = 0u32;
    let mut total = 0u32;

    let mut idx = 0u32;
    for ty in 0..th {
        for tx in 0..tw {
            idx += 1;
            if idx % sample != 0 {
                continue;
            }
            total += 1;
            if pixel_close(screen.get_pixel(ox + tx, oy + ty), template.get_pixel(tx, ty)) {
                matched += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        matched as f32 / total as f32
    }
}

/// Find the best placement of `template_path` inside `screen_path`.
/// Returns `None` when nothing clears the confidence threshold.
pub fn find_template(
    screen_path: &Path,
    template_path: &Path,
    confidence: f32,
) -> UiResult<Option<TemplateMatch>> {
    let screen = image::open(screen_path)
        .map_err(|e| UiError::OperationFailed(format!("screenshot decode: {e}")))?;
    let template = image::open(template_path)
        .map_err(|e| UiError::OperationFailed(format!("template decode: {e}")))?;

    let (sw, sh) = screen.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > sw || th > sh {
        return Err(UiError::InvalidArgument(
            "template larger than screenshot".to_string(),
        ));
    }

    let mut best: Option<TemplateMatch> = None;
    let mut oy = 0;
    while oy + th <= sh {
        let mut ox = 0;
        while ox + tw <= sw {
            let score = score_at(&screen, &template, ox, oy);
            if score >= confidence && best.map_or(true, |b| score > b.confidence) {
                best = Some(TemplateMatch {
                    center: Point {
                        x: (ox + tw / 2) as i32,
                        y: (oy + th / 2) as i32,
                    },
                    confidence: score,
                });
            }
            ox += STRIDE;
        }
        oy += STRIDE;
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba as ImRgba};

    fn write_png(path: &Path, w: u32, h: u32, f: impl Fn(u32, u32) -> [u8; 4]) {
        let img = ImageBuffer::from_fn(w, h, |x, y| ImRgba(f(x, y)));
        img.save(path).unwrap();
    }

    #[test]
    fn finds_embedded_template() {
        let dir = tempfile::tempdir().unwrap();
        let screen = dir.path().join("screen.png");
        let template = dir.path().join("tpl.png");

        // White screen with a solid red 8x8 block at (20, 12).
        write_png(&screen, 64, 48, |x, y| {
            if (20..28).contains(&x) && (12..20).contains(&y) {
                [200, 30, 30, 255]
            } else {
                [255, 255, 255, 255]
            }
        });
        write_png(&template, 8, 8, |_, _| [200, 30, 30, 255]);

        let found = find_template(&screen, &template, DEFAULT_CONFIDENCE)
            .unwrap()
            .unwrap();
        assert!((found.center.x - 24).abs() <= STRIDE as i32);
        assert!((found.center.y - 16).abs() <= STRIDE as i32);
        assert!(found.confidence >= DEFAULT_CONFIDENCE);
    }

    #[test]
    fn absent_template_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let screen = dir.path().join("screen.png");
        let template = dir.path().join("tpl.png");

        write_png(&screen, 64, 48, |_, _| [255, 255, 255, 255]);
        write_png(&template, 8, 8, |_, _| [0, 0, 0, 255]);

        assert!(find_template(&screen, &template, DEFAULT_CONFIDENCE)
            .unwrap()
            .is_none());
    }

    #[test]
    fn oversized_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let screen = dir.path().join("screen.png");
        let template = dir.path().join("tpl.png");

        write_png(&screen, 8, 8, |_, _| [255, 255, 255, 255]);
        write_png(&template, 16, 16, |_, _| [0, 0, 0, 255]);

        assert!(find_template(&screen, &template, DEFAULT_CONFIDENCE).is_err());
    }
}
