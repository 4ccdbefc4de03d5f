// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Detection result types consumed by the renderers and crop extractor.
//!
//! A [`DetectionResult`] is produced by a [`crate::Detector`] and never mutated
//! afterwards. Coordinates are in source-image pixels.

use ndarray::Array2;

/// Number of keypoints in a COCO-style pose.
pub const NUM_KEYPOINTS: usize = 17;

/// Values stored per keypoint: x, y, confidence.
pub const KEYPOINT_DIM: usize = 3;

/// Length of a full pose keypoint vector (17 × 3).
pub const POSE_VECTOR_LEN: usize = NUM_KEYPOINTS * KEYPOINT_DIM;

/// Axis-aligned rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl BoundingBox {
    /// Create a new box from its top-left corner and size.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge, saturating at `i32::MAX`.
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating at `i32::MAX`.
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Corner form `[x1, y1, x2, y2]` used by IoU computations.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn xyxy(&self) -> [f32; 4] {
        [
            self.x as f32,
            self.y as f32,
            self.right() as f32,
            self.bottom() as f32,
        ]
    }

    /// Intersect the box with an image of the given size.
    ///
    /// Returns `None` when nothing of the box lies inside the image.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn clip(&self, width: u32, height: u32) -> Option<Self> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Self::new(x1, y1, x2 - x1, y2 - y1))
    }
}

/// One detected instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionResult {
    /// Bounding box in source-image coordinates.
    pub bbox: BoundingBox,
    /// Class identifier.
    pub class_idx: usize,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
    /// Per-instance mask sized `(bbox.height, bbox.width)`; nonzero is foreground.
    pub mask: Option<Array2<f32>>,
    /// Flat `(x, y, confidence)` triples; empty when the model has no pose head.
    pub keypoints: Vec<f32>,
}

impl DetectionResult {
    /// Create a box-only detection.
    #[must_use]
    pub const fn new(bbox: BoundingBox, confidence: f32, class_idx: usize) -> Self {
        Self {
            bbox,
            class_idx,
            confidence,
            mask: None,
            keypoints: Vec::new(),
        }
    }

    /// Attach a segmentation mask.
    #[must_use]
    pub fn with_mask(mut self, mask: Array2<f32>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Attach a keypoint vector.
    #[must_use]
    pub fn with_keypoints(mut self, keypoints: Vec<f32>) -> Self {
        self.keypoints = keypoints;
        self
    }

    /// Returns the mask when it has non-zero rows and columns.
    #[must_use]
    pub fn mask(&self) -> Option<&Array2<f32>> {
        self.mask
            .as_ref()
            .filter(|m| m.nrows() > 0 && m.ncols() > 0)
    }
}
