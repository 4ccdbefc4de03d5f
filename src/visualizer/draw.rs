// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Anti-aliased drawing primitives shared by the overlay and pose renderers.
//!
//! `imageproc` covers rectangles and text; discs and thick lines are drawn
//! here with per-pixel coverage so markers blend smoothly into the image.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::pixelops::interpolate;
use imageproc::rect::Rect;

use crate::results::BoundingBox;

/// Blend `color` into the pixel at `(x, y)` with the given coverage.
///
/// Out-of-canvas coordinates are ignored.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
pub fn blend_pixel(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, coverage: f32) {
    let (width, height) = canvas.dimensions();
    if coverage <= 0.0 || x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    *pixel = interpolate(color, *pixel, coverage.min(1.0));
}

/// Inclusive pixel span `[lo - pad, hi + pad]` clipped to `0..extent`.
#[allow(clippy::cast_possible_truncation)]
fn clipped_span(lo: i32, hi: i32, pad: i32, extent: u32) -> Option<(i32, i32)> {
    let start = (i64::from(lo) - i64::from(pad)).max(0);
    let end = (i64::from(hi) + i64::from(pad))
        .min(i64::from(extent) - 1)
        .min(i64::from(i32::MAX));
    (start <= end).then_some((start as i32, end as i32))
}

/// Draw a filled, anti-aliased circle.
///
/// Only the part of the disc inside the canvas is visited.
#[allow(clippy::cast_precision_loss)]
pub fn draw_antialiased_disc(canvas: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    let (cx, cy) = center;
    let reach = radius.saturating_add(1);
    let (Some((x_min, x_max)), Some((y_min, y_max))) = (
        clipped_span(cx, cx, reach, width),
        clipped_span(cy, cy, reach, height),
    ) else {
        return;
    };
    let r = radius as f32;
    for y in y_min..=y_max {
        for x in x_min..=x_max {
            let d = (x as f32 - cx as f32).hypot(y as f32 - cy as f32);
            blend_pixel(canvas, x, y, color, r + 0.5 - d);
        }
    }
}

/// Draw an anti-aliased line segment of the given thickness with round caps.
///
/// Endpoints may lie far outside the canvas; only the segment's bounding box
/// clipped to the canvas is visited.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn draw_antialiased_segment(
    canvas: &mut RgbImage,
    start: (i32, i32),
    end: (i32, i32),
    thickness: f32,
    color: Rgb<u8>,
) {
    let (width, height) = canvas.dimensions();
    let half = thickness / 2.0;
    let pad = half.ceil() as i32 + 1;
    let (Some((x_min, x_max)), Some((y_min, y_max))) = (
        clipped_span(start.0.min(end.0), start.0.max(end.0), pad, width),
        clipped_span(start.1.min(end.1), start.1.max(end.1), pad, height),
    ) else {
        return;
    };

    let (x0, y0) = (start.0 as f32, start.1 as f32);
    let (dx, dy) = (end.0 as f32 - x0, end.1 as f32 - y0);
    let len_sq = dx.mul_add(dx, dy * dy);

    for y in y_min..=y_max {
        for x in x_min..=x_max {
            let (px, py) = (x as f32 - x0, y as f32 - y0);
            let t = if len_sq > 0.0 {
                (px.mul_add(dx, py * dy) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let d = t.mul_add(-dx, px).hypot(t.mul_add(-dy, py));
            blend_pixel(canvas, x, y, color, half + 0.5 - d);
        }
    }
}

/// Draw a hollow rectangle `thickness` pixels wide, growing inward from `bbox`.
///
/// Edges further than `thickness` outside the canvas are pulled in to that
/// margin first, so they stay invisible and line lengths stay bounded.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn draw_thick_rect(canvas: &mut RgbImage, bbox: BoundingBox, thickness: i32, color: Rgb<u8>) {
    let (canvas_w, canvas_h) = canvas.dimensions();
    let margin = i64::from(thickness);
    let x1 = i64::from(bbox.x).max(-margin);
    let y1 = i64::from(bbox.y).max(-margin);
    let x2 = i64::from(bbox.right()).min(i64::from(canvas_w) + margin);
    let y2 = i64::from(bbox.bottom()).min(i64::from(canvas_h) + margin);
    for t in 0..margin {
        let width = x2 - x1 - 2 * t;
        let height = y2 - y1 - 2 * t;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at((x1 + t) as i32, (y1 + t) as i32).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}
