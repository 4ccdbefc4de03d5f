// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Detector boundary and detection sidecar loading.
//!
//! The visualization and crop stages accept whatever a [`Detector`] emits
//! without re-filtering. Thresholds in [`DetectorConfig`] are applied here,
//! on the detector side.
//!
//! # Sidecar format
//!
//! [`JsonDetector`] reads `<dir>/<image stem>.json`, a list of:
//!
//! ```json
//! [
//!   {
//!     "bbox": [10, 10, 100, 100],
//!     "class_idx": 0,
//!     "confidence": 0.87,
//!     "mask": [[0.0, 0.9, ...], ...],
//!     "keypoints": [x0, y0, c0, x1, y1, c1, ...]
//!   }
//! ]
//! ```
//!
//! `bbox` is `[x, y, width, height]` in pixels. `mask` is optional and sized
//! `height` rows by `width` columns; `keypoints` is optional.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use ndarray::Array2;
use serde::Deserialize;

use crate::error::{QuadCropError, Result};
use crate::results::{BoundingBox, DetectionResult, KEYPOINT_DIM};
use crate::utils::nms_per_class;
use crate::warn;

/// Channel reordering applied to an image before it reaches the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorConversion {
    /// Pass pixels through unchanged.
    #[default]
    None,
    /// Swap the red and blue channels (BGR <-> RGB).
    SwapRb,
}

impl ColorConversion {
    /// Apply the conversion, borrowing the input when nothing changes.
    #[must_use]
    pub fn apply(self, image: &DynamicImage) -> Cow<'_, DynamicImage> {
        match self {
            Self::None => Cow::Borrowed(image),
            Self::SwapRb => {
                let mut rgb = image.to_rgb8();
                for pixel in rgb.pixels_mut() {
                    pixel.0.swap(0, 2);
                }
                Cow::Owned(DynamicImage::ImageRgb8(rgb))
            }
        }
    }
}

/// Detector-side filtering configuration.
///
/// # Example
///
/// ```rust
/// use quadcrop::DetectorConfig;
///
/// let config = DetectorConfig::new()
///     .with_confidence(0.5)
///     .with_iou(0.45)
///     .with_mask_threshold(0.6);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Detections scoring below this value are discarded.
    pub confidence_threshold: f32,
    /// `IoU` above which a lower-scored box of the same class is suppressed.
    pub iou_threshold: f32,
    /// Mask values above this become foreground.
    pub mask_threshold: f32,
    /// Channel conversion applied to the detector's input image.
    pub color_conversion: ColorConversion,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.30,
            iou_threshold: 0.45,
            mask_threshold: 0.5,
            color_conversion: ColorConversion::None,
        }
    }
}

impl DetectorConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the confidence threshold.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the `IoU` threshold for per-class NMS.
    #[must_use]
    pub const fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the mask binarization threshold.
    #[must_use]
    pub const fn with_mask_threshold(mut self, threshold: f32) -> Self {
        self.mask_threshold = threshold;
        self
    }

    /// Set the input color conversion.
    #[must_use]
    pub const fn with_color_conversion(mut self, conversion: ColorConversion) -> Self {
        self.color_conversion = conversion;
        self
    }

    /// Check that every threshold lies in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`QuadCropError::ConfigError`] naming the first bad threshold.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("conf", self.confidence_threshold),
            ("iou", self.iou_threshold),
            ("mask-threshold", self.mask_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(QuadCropError::ConfigError(format!(
                    "{name}={value} must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Produces detections for one image at a time.
pub trait Detector {
    /// Detect instances in `image`, loaded from `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if detections cannot be produced for this image.
    fn detect(
        &mut self,
        image: &DynamicImage,
        source: &Path,
        config: &DetectorConfig,
    ) -> Result<Vec<DetectionResult>>;
}

/// One entry of a detection sidecar file.
#[derive(Debug, Deserialize)]
struct RawDetection {
    bbox: [i32; 4],
    class_idx: usize,
    confidence: f32,
    #[serde(default)]
    mask: Vec<Vec<f32>>,
    #[serde(default)]
    keypoints: Vec<f32>,
}

impl RawDetection {
    fn into_result(self, mask_threshold: f32) -> Result<DetectionResult> {
        let [x, y, width, height] = self.bbox;
        if width < 0 || height < 0 {
            return Err(QuadCropError::DetectorError(format!(
                "Negative bbox size {width}x{height}"
            )));
        }
        if self.keypoints.len() % KEYPOINT_DIM != 0 {
            return Err(QuadCropError::DetectorError(format!(
                "Keypoint vector length {} is not a multiple of {KEYPOINT_DIM}",
                self.keypoints.len()
            )));
        }

        let bbox = BoundingBox::new(x, y, width, height);
        let mut det = DetectionResult::new(bbox, self.confidence, self.class_idx)
            .with_keypoints(self.keypoints);
        if !self.mask.is_empty() {
            det = det.with_mask(binarize_mask(&self.mask, bbox, mask_threshold)?);
        }
        Ok(det)
    }
}

/// Turn nested mask rows into a `0.0`/`1.0` array matching `bbox`.
#[allow(clippy::cast_sign_loss)]
fn binarize_mask(rows: &[Vec<f32>], bbox: BoundingBox, threshold: f32) -> Result<Array2<f32>> {
    let (h, w) = (bbox.height as usize, bbox.width as usize);
    if rows.len() != h || rows.iter().any(|r| r.len() != w) {
        return Err(QuadCropError::DetectorError(format!(
            "Mask shape does not match bbox {}x{}",
            bbox.width, bbox.height
        )));
    }
    Ok(Array2::from_shape_fn((h, w), |(r, c)| {
        if rows[r][c] > threshold { 1.0 } else { 0.0 }
    }))
}

/// Apply the confidence filter and per-class NMS to raw detections.
#[must_use]
pub fn filter_detections(
    detections: Vec<DetectionResult>,
    config: &DetectorConfig,
) -> Vec<DetectionResult> {
    let mut candidates: Vec<Option<DetectionResult>> = detections
        .into_iter()
        .filter(|d| d.confidence >= config.confidence_threshold)
        .map(Some)
        .collect();
    let boxes: Vec<([f32; 4], f32, usize)> = candidates
        .iter()
        .flatten()
        .map(|d| (d.bbox.xyxy(), d.confidence, d.class_idx))
        .collect();
    nms_per_class(&boxes, config.iou_threshold)
        .into_iter()
        .filter_map(|i| candidates[i].take())
        .collect()
}

/// Parse a class-name mapping such as `{"0": "crack", "1": "spall"}`.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or a key is not a class index.
pub fn parse_names(json: &str) -> Result<HashMap<usize, String>> {
    let raw: HashMap<String, String> = serde_json::from_str(json)
        .map_err(|e| QuadCropError::ConfigError(format!("Malformed class names: {e}")))?;
    raw.into_iter()
        .map(|(k, v)| {
            k.trim()
                .parse::<usize>()
                .map(|idx| (idx, v))
                .map_err(|_| QuadCropError::ConfigError(format!("Invalid class index '{k}'")))
        })
        .collect()
}

/// Load a class-name mapping from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_names<P: AsRef<Path>>(path: P) -> Result<HashMap<usize, String>> {
    parse_names(&std::fs::read_to_string(path)?)
}

/// Reads precomputed detections from JSON sidecar files.
#[derive(Debug, Clone)]
pub struct JsonDetector {
    dir: PathBuf,
}

impl JsonDetector {
    /// Create a detector reading sidecars from `dir`.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Sidecar path for a source image.
    #[must_use]
    pub fn sidecar_path(&self, source: &Path) -> PathBuf {
        let stem = source.file_stem().unwrap_or_default().to_string_lossy();
        self.dir.join(format!("{stem}.json"))
    }

    /// Parse a sidecar document and apply the detector-side filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or an entry is inconsistent.
    pub fn parse(json: &str, config: &DetectorConfig) -> Result<Vec<DetectionResult>> {
        let raw: Vec<RawDetection> = serde_json::from_str(json)?;
        let detections = raw
            .into_iter()
            .map(|r| r.into_result(config.mask_threshold))
            .collect::<Result<Vec<_>>>()?;
        Ok(filter_detections(detections, config))
    }
}

impl Detector for JsonDetector {
    fn detect(
        &mut self,
        _image: &DynamicImage,
        source: &Path,
        config: &DetectorConfig,
    ) -> Result<Vec<DetectionResult>> {
        let path = self.sidecar_path(source);
        if !path.exists() {
            warn!("No detections found at {}", path.display());
            return Ok(Vec::new());
        }
        let json = std::fs::read_to_string(&path)?;
        Self::parse(&json, config)
            .map_err(|e| QuadCropError::DetectorError(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_config_default() {
        let config = DetectorConfig::default();
        assert!((config.confidence_threshold - 0.30).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.45).abs() < f32::EPSILON);
        assert!((config.mask_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.color_conversion, ColorConversion::None);
    }

    #[test]
    fn test_config_builder_and_validate() {
        let config = DetectorConfig::new()
            .with_confidence(0.5)
            .with_iou(0.6)
            .with_mask_threshold(0.4)
            .with_color_conversion(ColorConversion::SwapRb);
        assert!((config.iou_threshold - 0.6).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());

        let err = DetectorConfig::new().with_iou(1.5).validate().unwrap_err();
        assert!(err.to_string().contains("iou"));
    }

    #[test]
    fn test_swap_rb() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])));
        let swapped = ColorConversion::SwapRb.apply(&image);
        assert_eq!(*swapped.to_rgb8().get_pixel(0, 0), Rgb([3, 2, 1]));
        assert!(matches!(ColorConversion::None.apply(&image), Cow::Borrowed(_)));
    }

    #[test]
    fn test_parse_filters_confidence_and_overlap() {
        let json = r#"[
            {"bbox": [0, 0, 10, 10], "class_idx": 0, "confidence": 0.9},
            {"bbox": [1, 1, 10, 10], "class_idx": 0, "confidence": 0.8},
            {"bbox": [1, 1, 10, 10], "class_idx": 1, "confidence": 0.7},
            {"bbox": [50, 50, 10, 10], "class_idx": 0, "confidence": 0.1}
        ]"#;
        let dets = JsonDetector::parse(json, &DetectorConfig::default()).unwrap();
        assert_eq!(dets.len(), 2);
        assert!((dets[0].confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(dets[1].class_idx, 1);
    }

    #[test]
    fn test_parse_binarizes_mask() {
        let json = r#"[{"bbox": [0, 0, 2, 2], "class_idx": 0, "confidence": 0.9,
                        "mask": [[0.2, 0.7], [0.5, 1.0]]}]"#;
        let dets = JsonDetector::parse(json, &DetectorConfig::default()).unwrap();
        let mask = dets[0].mask().unwrap();
        assert_eq!(mask, &ndarray::array![[0.0_f32, 1.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_parse_rejects_inconsistent_entries() {
        let bad_mask = r#"[{"bbox": [0, 0, 3, 2], "class_idx": 0, "confidence": 0.9,
                            "mask": [[1.0, 1.0], [1.0, 1.0]]}]"#;
        assert!(JsonDetector::parse(bad_mask, &DetectorConfig::default()).is_err());

        let bad_kpts = r#"[{"bbox": [0, 0, 3, 2], "class_idx": 0, "confidence": 0.9,
                            "keypoints": [1.0, 2.0]}]"#;
        assert!(JsonDetector::parse(bad_kpts, &DetectorConfig::default()).is_err());

        assert!(JsonDetector::parse("{not json", &DetectorConfig::default()).is_err());
    }

    #[test]
    fn test_parse_keeps_far_off_canvas_boxes() {
        let json = r#"[
            {"bbox": [2000000000, 0, 2000000000, 10], "class_idx": 0, "confidence": 0.9},
            {"bbox": [2000000001, 0, 2000000000, 10], "class_idx": 0, "confidence": 0.8}
        ]"#;
        let dets = JsonDetector::parse(json, &DetectorConfig::default()).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox.right(), i32::MAX);
    }

    #[test]
    fn test_parse_names() {
        let names = parse_names(r#"{"0": "crack", "2": "spall"}"#).unwrap();
        assert_eq!(names[&0], "crack");
        assert_eq!(names[&2], "spall");
        assert!(parse_names(r#"{"zero": "crack"}"#).is_err());
    }

    #[test]
    fn test_sidecar_path_uses_stem() {
        let detector = JsonDetector::new("dets");
        assert_eq!(
            detector.sidecar_path(Path::new("imgs/a.JPG")),
            Path::new("dets").join("a.json")
        );
    }

    #[test]
    fn test_missing_sidecar_yields_no_detections() {
        let dir = tempfile::tempdir().unwrap();
        let mut detector = JsonDetector::new(dir.path());
        let image = DynamicImage::new_rgb8(4, 4);
        let dets = detector
            .detect(&image, Path::new("missing.png"), &DetectorConfig::default())
            .unwrap();
        assert!(dets.is_empty());
    }
}
