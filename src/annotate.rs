// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Overlay rendering: boxes, labels, mask tinting and pose markers.
//!
//! Every instance is drawn onto a working copy of the image while mask
//! tinting goes to a separate layer cloned from the untouched image. After the
//! last instance the layer is blended into the working copy once, with weights
//! [`IMAGE_WEIGHT`] / [`MASK_WEIGHT`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::download::check_font;
use crate::error::{QuadCropError, Result};
use crate::results::DetectionResult;
use crate::visualizer::draw::draw_thick_rect;
use crate::visualizer::{Color, Palette, PoseRenderer};
use crate::warn;

/// Weight of the annotated image in the final blend.
pub const IMAGE_WEIGHT: f32 = 0.6;

/// Weight of the mask layer in the final blend.
pub const MASK_WEIGHT: f32 = 0.4;

/// Bounding box line thickness in pixels.
pub const BOX_THICKNESS: i32 = 2;

/// Default label font size in pixels.
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

/// Font downloaded when no local font is configured.
pub const DEFAULT_FONT: &str = "Arial.ttf";

/// Resolve a class name, falling back to the decimal class index.
///
/// A missing name is reported as a warning; rendering continues.
#[must_use]
pub fn class_name(names: &HashMap<usize, String>, class_idx: usize) -> Cow<'_, str> {
    if let Some(name) = names.get(&class_idx) {
        return Cow::Borrowed(name.as_str());
    }
    warn!("class_idx not found in names for class_idx = {class_idx}");
    Cow::Owned(class_idx.to_string())
}

/// Format a label as `"<name> <confidence with 2 decimals>"`.
#[must_use]
pub fn format_label(name: &str, confidence: f32) -> String {
    format!("{name} {confidence:.2}")
}

/// Load a TrueType/OpenType font from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid font.
pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontVec> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    FontVec::try_from_vec(data)
        .map_err(|e| QuadCropError::FontError(format!("{}: {e}", path.display())))
}

/// Weighted per-channel blend of `layer` into `base`, rounding to nearest.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blend_layers(base: &mut RgbImage, layer: &RgbImage, base_weight: f32, layer_weight: f32) {
    for (b, l) in base.pixels_mut().zip(layer.pixels()) {
        for c in 0..3 {
            let v = f32::from(b[c]).mul_add(base_weight, f32::from(l[c]) * layer_weight);
            b[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Paint `color` into `layer` wherever the instance mask is nonzero.
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn tint_mask(layer: &mut RgbImage, det: &DetectionResult, color: Rgb<u8>) {
    let Some(mask) = det.mask() else {
        return;
    };
    let (width, height) = layer.dimensions();
    for ((row, col), &v) in mask.indexed_iter() {
        if v == 0.0 {
            continue;
        }
        let x = i64::from(det.bbox.x) + col as i64;
        let y = i64::from(det.bbox.y) + row as i64;
        if x >= 0 && y >= 0 && x < i64::from(width) && y < i64::from(height) {
            layer.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Standalone keypoint pass over a batch of results.
///
/// Uses the same pose routine as [`Annotator::plot_results`].
pub fn plot_keypoints(canvas: &mut RgbImage, results: &[DetectionResult]) {
    let mut pose = PoseRenderer::new();
    for det in results {
        pose.draw(canvas, &det.keypoints);
    }
}

/// Draws detection overlays onto images.
pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(None, DEFAULT_FONT_SIZE)
    }
}

impl Annotator {
    /// Create an annotator. Without a font, label text and background are skipped.
    #[must_use]
    pub fn new(font: Option<FontVec>, font_size: f32) -> Self {
        Self {
            font,
            scale: PxScale::from(font_size),
        }
    }

    /// Create an annotator using a local font file, or the cached default font.
    ///
    /// A font that cannot be found, downloaded or parsed is reported and
    /// labels are skipped.
    #[must_use]
    pub fn with_font_file(path: Option<&Path>, font_size: f32) -> Self {
        let path = path.map(Path::to_path_buf).or_else(|| check_font(DEFAULT_FONT));
        let font = path.and_then(|p| match load_font(&p) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Failed to load label font: {e}");
                None
            }
        });
        Self::new(font, font_size)
    }

    /// Whether labels (background and text) are drawn.
    #[must_use]
    pub const fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw the label background and text directly above the box's top-left corner.
    fn draw_label(&self, canvas: &mut RgbImage, det: &DetectionResult, label: &str, color: Rgb<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let (text_w, text_h) = text_size(self.scale, font, label);
        let (left, top) = (det.bbox.x, det.bbox.y);
        #[allow(clippy::cast_possible_wrap)]
        let text_h_i = text_h as i32;
        let background = Rect::at(left - 1, top - text_h_i - 5).of_size(text_w + 2, text_h + 5);
        draw_filled_rect_mut(canvas, background, color);
        draw_text_mut(
            canvas,
            Color::WHITE.to_rgb(),
            left - 1,
            top - text_h_i - 3,
            self.scale,
            font,
            label,
        );
    }

    /// Draw box, mask tint and label for one instance, in that order.
    fn draw_instance(
        &self,
        canvas: &mut RgbImage,
        mask_layer: &mut RgbImage,
        det: &DetectionResult,
        palette: &Palette,
        names: &HashMap<usize, String>,
    ) -> Result<()> {
        let color = palette.color(det.class_idx)?.to_rgb();
        draw_thick_rect(canvas, det.bbox, BOX_THICKNESS, color);
        tint_mask(mask_layer, det, color);
        let label = format_label(&class_name(names, det.class_idx), det.confidence);
        self.draw_label(canvas, det, &label, color);
        Ok(())
    }

    /// Draw boxes, labels and blended masks.
    ///
    /// The result is always 8-bit RGB: alpha is dropped and grayscale is
    /// expanded, whatever the input format.
    ///
    /// # Errors
    ///
    /// Returns [`QuadCropError::InvalidArgument`] if a class index is outside the palette.
    pub fn plot_masks(
        &self,
        image: &DynamicImage,
        results: &[DetectionResult],
        palette: &Palette,
        names: &HashMap<usize, String>,
    ) -> Result<RgbImage> {
        let mut canvas = image.to_rgb8();
        let mut mask_layer = canvas.clone();
        for det in results {
            self.draw_instance(&mut canvas, &mut mask_layer, det, palette, names)?;
        }
        blend_layers(&mut canvas, &mask_layer, IMAGE_WEIGHT, MASK_WEIGHT);
        Ok(canvas)
    }

    /// Combined pass: boxes, labels, masks and pose keypoints.
    ///
    /// Like [`Annotator::plot_masks`], the result is 8-bit RGB regardless of
    /// the input format.
    ///
    /// # Errors
    ///
    /// Returns [`QuadCropError::InvalidArgument`] if a class index is outside the palette.
    pub fn plot_results(
        &self,
        image: &DynamicImage,
        results: &[DetectionResult],
        palette: &Palette,
        names: &HashMap<usize, String>,
    ) -> Result<RgbImage> {
        let mut canvas = image.to_rgb8();
        let mut mask_layer = canvas.clone();
        let mut pose = PoseRenderer::new();
        for det in results {
            self.draw_instance(&mut canvas, &mut mask_layer, det, palette, names)?;
            pose.draw(&mut canvas, &det.keypoints);
        }
        blend_layers(&mut canvas, &mask_layer, IMAGE_WEIGHT, MASK_WEIGHT);
        Ok(canvas)
    }
}
