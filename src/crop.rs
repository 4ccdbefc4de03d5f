// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Quadrilateral crop extraction from instance masks.
//!
//! For every instance with a segmentation mask the extractor:
//!
//! 1. scales the mask to an 8-bit image,
//! 2. traces external contours and keeps the one with the largest area,
//! 3. picks four extreme corners (min/max of `x + y` and `x - y`),
//! 4. pulls each corner toward the corners' centroid by a fixed ratio,
//! 5. rasterizes the shrunk quadrilateral and copies only the covered source
//!    pixels into a transparent RGBA image.
//!
//! The corner heuristic suits roughly axis-aligned convex objects such as
//! cards or panels. It is not a minimum-area quadrilateral fit, and rotated or
//! concave masks can yield corners that do not form a sensible rectangle.

use image::{GrayImage, Luma, Rgba, RgbaImage, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use ndarray::Array2;

use crate::results::{BoundingBox, DetectionResult};

/// Default fraction each corner moves toward the centroid.
pub const SHRINK_RATIO: f32 = 0.05;

const FOREGROUND: Luma<u8> = Luma([255]);

/// Why an instance produced no crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The detector emitted no mask for the instance.
    NoMask,
    /// The mask has zero rows or columns, or its box lies outside the image.
    DegenerateMask,
    /// The mask has no foreground outline.
    NoContour,
}

/// Per-instance result of crop extraction.
#[derive(Debug, Clone)]
pub enum CropOutcome {
    /// A crop was produced; `index` counts extracted crops within the image.
    Extracted {
        /// Position among this image's crops, starting at 0.
        index: usize,
        /// Transparent-background crop sized to the mask.
        crop: RgbaImage,
    },
    /// No crop for this instance.
    Skipped(SkipReason),
}

/// Crop outcomes for every instance of one image, in detection order.
#[derive(Debug, Clone, Default)]
pub struct CropReport {
    /// One entry per detection.
    pub outcomes: Vec<CropOutcome>,
}

impl CropReport {
    /// Iterate over extracted crops as `(index, crop)`.
    pub fn crops(&self) -> impl Iterator<Item = (usize, &RgbaImage)> {
        self.outcomes.iter().filter_map(|o| match o {
            CropOutcome::Extracted { index, crop } => Some((*index, crop)),
            CropOutcome::Skipped(_) => None,
        })
    }

    /// Number of extracted crops.
    #[must_use]
    pub fn extracted(&self) -> usize {
        self.crops().count()
    }

    /// Why each skipped instance produced no crop, in detection order.
    pub fn skipped(&self) -> impl Iterator<Item = SkipReason> + '_ {
        self.outcomes.iter().filter_map(|o| match o {
            CropOutcome::Skipped(reason) => Some(*reason),
            CropOutcome::Extracted { .. } => None,
        })
    }
}

/// Four corners of a mask outline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    /// Corners in order top-left, top-right, bottom-right, bottom-left.
    pub corners: [Point<f32>; 4],
}

impl Quad {
    /// Pick extreme corners from a contour in a single pass.
    ///
    /// Top-left minimizes `x + y`, bottom-right maximizes it; bottom-left
    /// minimizes `x - y`, top-right maximizes it. Ties keep the first point.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_contour(points: &[Point<i32>]) -> Option<Self> {
        let first = *points.first()?;
        let (mut tl, mut tr, mut br, mut bl) = (first, first, first, first);
        for &p in &points[1..] {
            let sum = p.x + p.y;
            let diff = p.x - p.y;
            if sum < tl.x + tl.y {
                tl = p;
            }
            if sum > br.x + br.y {
                br = p;
            }
            if diff < bl.x - bl.y {
                bl = p;
            }
            if diff > tr.x - tr.y {
                tr = p;
            }
        }
        let f = |p: Point<i32>| Point::new(p.x as f32, p.y as f32);
        Some(Self {
            corners: [f(tl), f(tr), f(br), f(bl)],
        })
    }

    /// Mean of the four corners.
    #[must_use]
    pub fn centroid(&self) -> Point<f32> {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / 4.0, sy / 4.0)
    }

    /// Move every corner toward the centroid by `ratio` of the distance.
    ///
    /// A ratio of 0 keeps the quad, 1 collapses it onto the centroid.
    #[must_use]
    pub fn shrink(&self, ratio: f32) -> Self {
        let c = self.centroid();
        Self {
            corners: self
                .corners
                .map(|p| Point::new(ratio.mul_add(c.x - p.x, p.x), ratio.mul_add(c.y - p.y, p.y))),
        }
    }

    /// Corners rounded to the pixel grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_pixels(&self) -> [Point<i32>; 4] {
        self.corners
            .map(|p| Point::new(p.x.round_ties_even() as i32, p.y.round_ties_even() as i32))
    }
}

/// Scale a mask to an 8-bit image: 1.0 maps to 255, values saturate.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn mask_to_gray(mask: &Array2<f32>) -> GrayImage {
    let (rows, cols) = mask.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = mask[[y as usize, x as usize]] * 255.0;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

/// Trace outer boundaries of the foreground regions.
///
/// Holes and regions nested inside holes are dropped. Each chain keeps only
/// the points where its direction changes.
#[must_use]
pub fn external_contours(gray: &GrayImage) -> Vec<Vec<Point<i32>>> {
    // One pixel of background around the mask so border-touching regions
    // trace closed outlines.
    let (w, h) = gray.dimensions();
    let mut padded = GrayImage::new(w + 2, h + 2);
    image::imageops::replace(&mut padded, gray, 1, 1);

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            let shifted = c
                .points
                .into_iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect();
            simplify_chain(shifted)
        })
        .collect()
}

/// Drop points lying mid-way on horizontal, vertical or diagonal runs.
fn simplify_chain(mut points: Vec<Point<i32>>) -> Vec<Point<i32>> {
    points.dedup();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    let n = points.len();
    if n < 3 {
        return points;
    }
    let step = |a: Point<i32>, b: Point<i32>| ((b.x - a.x).signum(), (b.y - a.y).signum());
    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect()
}

/// Enclosed area of a closed polygon (shoelace formula).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: i64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y)
        })
        .sum();
    twice.abs() as f64 / 2.0
}

/// The contour with the largest enclosed area; the first one when all are flat.
#[must_use]
pub fn largest_contour(contours: &[Vec<Point<i32>>]) -> Option<&[Point<i32>]> {
    let mut best = 0;
    let mut best_area = 0.0;
    for (i, c) in contours.iter().enumerate() {
        let area = contour_area(c);
        if area > best_area {
            best_area = area;
            best = i;
        }
    }
    contours.get(best).map(Vec::as_slice)
}

/// Convex hull of `points` in winding order, without collinear points.
fn convex_hull(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut pts = points.to_vec();
    pts.sort_unstable_by_key(|p| (p.x, p.y));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    let cross = |o: Point<i32>, a: Point<i32>, b: Point<i32>| {
        i64::from(a.x - o.x) * i64::from(b.y - o.y) - i64::from(a.y - o.y) * i64::from(b.x - o.x)
    };
    let reversed: Vec<Point<i32>> = pts.iter().rev().copied().collect();
    let mut hull: Vec<Point<i32>> = Vec::with_capacity(pts.len() * 2);
    for pass in [pts.as_slice(), reversed.as_slice()] {
        let start = hull.len();
        for &p in pass {
            while hull.len() >= start + 2
                && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0
            {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
    }
    hull
}

/// Rasterize a convex polygon, edges included, into a `width × height` mask.
///
/// Corners that collapse onto a segment or a single point still mark those pixels.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn fill_convex_polygon(width: u32, height: u32, polygon: &[Point<i32>]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let hull = convex_hull(polygon);
    match hull.as_slice() {
        [] => {}
        [p] => {
            if p.x >= 0 && p.y >= 0 && p.x < width as i32 && p.y < height as i32 {
                mask.put_pixel(p.x as u32, p.y as u32, FOREGROUND);
            }
        }
        [a, b] => draw_line_segment_mut(
            &mut mask,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            FOREGROUND,
        ),
        _ => draw_polygon_mut(&mut mask, &hull, FOREGROUND),
    }
    mask
}

/// Copy source pixels under `mask` into a transparent RGBA image.
///
/// `mask` is laid over the source starting at the top-left corner of `bbox`;
/// mask pixels falling outside the source stay transparent.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn transparent_crop(source: &RgbImage, bbox: BoundingBox, mask: &GrayImage) -> RgbaImage {
    let (src_w, src_h) = source.dimensions();
    let mut out = RgbaImage::from_pixel(mask.width(), mask.height(), Rgba([0, 0, 0, 0]));
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 {
            continue;
        }
        let sx = i64::from(bbox.x) + i64::from(x);
        let sy = i64::from(bbox.y) + i64::from(y);
        if sx < 0 || sy < 0 || sx >= i64::from(src_w) || sy >= i64::from(src_h) {
            continue;
        }
        let [r, g, b] = source.get_pixel(sx as u32, sy as u32).0;
        out.put_pixel(x, y, Rgba([r, g, b, 255]));
    }
    out
}

/// Extract the shrunk-quad crop for one instance.
///
/// # Errors
///
/// Returns the [`SkipReason`] when the instance yields no crop.
pub fn extract_quad_crop(
    source: &RgbImage,
    detection: &DetectionResult,
    shrink_ratio: f32,
) -> std::result::Result<RgbaImage, SkipReason> {
    let mask = match &detection.mask {
        None => return Err(SkipReason::NoMask),
        Some(m) if m.nrows() == 0 || m.ncols() == 0 => return Err(SkipReason::DegenerateMask),
        Some(m) => m,
    };
    let (w, h) = source.dimensions();
    if detection.bbox.clip(w, h).is_none() {
        return Err(SkipReason::DegenerateMask);
    }

    let gray = mask_to_gray(mask);
    let contours = external_contours(&gray);
    let outline = largest_contour(&contours).ok_or(SkipReason::NoContour)?;
    let quad = Quad::from_contour(outline).ok_or(SkipReason::NoContour)?;

    let shrunk = quad.shrink(shrink_ratio).to_pixels();
    let shrunk_mask = fill_convex_polygon(gray.width(), gray.height(), &shrunk);
    Ok(transparent_crop(source, detection.bbox, &shrunk_mask))
}

/// Extract crops for every detection of one image.
///
/// Instances that yield no crop are recorded and skipped; they do not
/// consume a crop index and do not affect later instances.
#[must_use]
pub fn extract_crops(source: &RgbImage, results: &[DetectionResult], shrink_ratio: f32) -> CropReport {
    let mut next_index = 0;
    let outcomes = results
        .iter()
        .map(|det| match extract_quad_crop(source, det, shrink_ratio) {
            Ok(crop) => {
                let index = next_index;
                next_index += 1;
                CropOutcome::Extracted { index, crop }
            }
            Err(reason) => CropOutcome::Skipped(reason),
        })
        .collect();
    CropReport { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn rect_mask(rows: usize, cols: usize) -> Array2<f32> {
        Array2::ones((rows, cols))
    }

    fn opaque_count(crop: &RgbaImage) -> usize {
        crop.pixels().filter(|p| p[3] == 255).count()
    }

    #[test]
    fn test_mask_to_gray_scales_and_saturates() {
        let mask = ndarray::array![[0.0, 1.0], [0.5, 3.0]];
        let gray = mask_to_gray(&mask);
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
        assert_eq!(gray.get_pixel(1, 0)[0], 255);
        assert_eq!(gray.get_pixel(0, 1)[0], 128);
        assert_eq!(gray.get_pixel(1, 1)[0], 255);
    }

    #[test]
    fn test_rectangle_contour_corners() {
        let gray = mask_to_gray(&rect_mask(20, 30));
        let contours = external_contours(&gray);
        assert_eq!(contours.len(), 1);
        let quad = Quad::from_contour(&contours[0]).unwrap();
        assert_eq!(
            quad.corners,
            [
                Point::new(0.0, 0.0),
                Point::new(29.0, 0.0),
                Point::new(29.0, 19.0),
                Point::new(0.0, 19.0),
            ]
        );
    }

    #[test]
    fn test_simplified_rectangle_has_four_points() {
        let gray = mask_to_gray(&rect_mask(10, 10));
        let contours = external_contours(&gray);
        assert_eq!(contours[0].len(), 4);
        assert!((contour_area(&contours[0]) - 81.0).abs() < 1e-9);
    }

    #[test]
    fn test_largest_contour_selected() {
        let mut mask = Array2::zeros((40, 40));
        mask.slice_mut(ndarray::s![2..6, 2..6]).fill(1.0);
        mask.slice_mut(ndarray::s![10..35, 10..30]).fill(1.0);
        let contours = external_contours(&mask_to_gray(&mask));
        assert_eq!(contours.len(), 2);
        let largest = largest_contour(&contours).unwrap();
        let quad = Quad::from_contour(largest).unwrap();
        assert_eq!(quad.corners[0], Point::new(10.0, 10.0));
        assert_eq!(quad.corners[2], Point::new(29.0, 34.0));
    }

    #[test]
    fn test_hole_is_not_an_outline() {
        let mut mask = rect_mask(20, 20);
        mask.slice_mut(ndarray::s![5..15, 5..15]).fill(0.0);
        let contours = external_contours(&mask_to_gray(&mask));
        assert_eq!(contours.len(), 1);
    }

    #[test]
    fn test_shrink_ratio_zero_and_one() {
        let quad = Quad {
            corners: [
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 6.0),
                Point::new(0.0, 6.0),
            ],
        };
        assert_eq!(quad.shrink(0.0), quad);

        let c = quad.centroid();
        for p in quad.shrink(1.0).corners {
            assert!((p.x - c.x).abs() < 1e-6 && (p.y - c.y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fill_convex_polygon_includes_edges() {
        let square = [
            Point::new(2, 2),
            Point::new(5, 2),
            Point::new(5, 5),
            Point::new(2, 5),
        ];
        let mask = fill_convex_polygon(8, 8, &square);
        assert_eq!(mask.pixels().filter(|p| p[0] == 255).count(), 16);
        assert_eq!(mask.get_pixel(2, 2)[0], 255);
        assert_eq!(mask.get_pixel(6, 6)[0], 0);
    }

    #[test]
    fn test_fill_collapsed_polygon_is_single_pixel() {
        let point = [Point::new(3, 4); 4];
        let mask = fill_convex_polygon(8, 8, &point);
        assert_eq!(mask.pixels().filter(|p| p[0] == 255).count(), 1);
        assert_eq!(mask.get_pixel(3, 4)[0], 255);
    }

    #[test]
    fn test_fill_flat_polygon_draws_segment() {
        let flat = [
            Point::new(1, 3),
            Point::new(6, 3),
            Point::new(6, 3),
            Point::new(1, 3),
        ];
        let mask = fill_convex_polygon(8, 8, &flat);
        assert_eq!(mask.pixels().filter(|p| p[0] == 255).count(), 6);
        assert_eq!(mask.get_pixel(1, 3)[0], 255);
        assert_eq!(mask.get_pixel(6, 3)[0], 255);
    }

    #[test]
    fn test_fill_crossed_corners_uses_hull() {
        // Corners out of order still rasterize the square they span.
        let crossed = [
            Point::new(2, 2),
            Point::new(5, 5),
            Point::new(5, 2),
            Point::new(2, 5),
        ];
        let mask = fill_convex_polygon(8, 8, &crossed);
        assert_eq!(mask.pixels().filter(|p| p[0] == 255).count(), 16);
    }

    #[test]
    fn test_rectangle_crop_is_strictly_inside() {
        let source = RgbImage::from_pixel(200, 200, Rgb([10, 20, 30]));
        let det = DetectionResult::new(BoundingBox::new(10, 10, 100, 100), 0.9, 0)
            .with_mask(rect_mask(100, 100));
        let crop = extract_quad_crop(&source, &det, SHRINK_RATIO).unwrap();

        assert_eq!(crop.dimensions(), (100, 100));
        let opaque = opaque_count(&crop);
        assert!(opaque > 0 && opaque < 100 * 100);
        assert_eq!(crop.get_pixel(0, 0)[3], 0);
        assert_eq!(crop.get_pixel(99, 99)[3], 0);
        assert_eq!(*crop.get_pixel(50, 50), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_crop_copies_pixels_from_box_offset() {
        let mut source = RgbImage::new(50, 50);
        source.put_pixel(25, 25, Rgb([200, 100, 50]));
        let det = DetectionResult::new(BoundingBox::new(20, 20, 10, 10), 0.9, 0)
            .with_mask(rect_mask(10, 10));
        let crop = extract_quad_crop(&source, &det, 0.0).unwrap();
        assert_eq!(*crop.get_pixel(5, 5), Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn test_skip_reasons() {
        let source = RgbImage::new(64, 64);
        let bbox = BoundingBox::new(0, 0, 10, 10);

        let no_mask = DetectionResult::new(bbox, 0.9, 0);
        assert_eq!(extract_quad_crop(&source, &no_mask, SHRINK_RATIO), Err(SkipReason::NoMask));

        let empty = no_mask.clone().with_mask(Array2::zeros((0, 0)));
        assert_eq!(
            extract_quad_crop(&source, &empty, SHRINK_RATIO),
            Err(SkipReason::DegenerateMask)
        );

        let blank = no_mask.with_mask(Array2::zeros((10, 10)));
        assert_eq!(extract_quad_crop(&source, &blank, SHRINK_RATIO), Err(SkipReason::NoContour));
    }

    #[test]
    fn test_missing_contour_does_not_stop_later_instances() {
        let source = RgbImage::new(64, 64);
        let bbox = BoundingBox::new(4, 4, 20, 20);
        let results = vec![
            DetectionResult::new(bbox, 0.9, 0).with_mask(rect_mask(20, 20)),
            DetectionResult::new(bbox, 0.9, 0).with_mask(Array2::zeros((20, 20))),
            DetectionResult::new(bbox, 0.9, 0),
            DetectionResult::new(bbox, 0.9, 0).with_mask(rect_mask(20, 20)),
        ];
        let report = extract_crops(&source, &results, SHRINK_RATIO);

        let indices: Vec<usize> = report.crops().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1]);
        let skipped: Vec<SkipReason> = report.skipped().collect();
        assert_eq!(skipped, vec![SkipReason::NoContour, SkipReason::NoMask]);
        assert!(matches!(report.outcomes[3], CropOutcome::Extracted { index: 1, .. }));
    }
}
