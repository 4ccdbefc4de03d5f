// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Keypoint and skeleton rendering.
//!
//! [`PoseRenderer`] is the single pose-drawing routine used by both the
//! standalone keypoint pass ([`crate::annotate::plot_keypoints`]) and the
//! combined overlay pass ([`crate::annotate::Annotator::plot_results`]).
//!
//! # Boundary sentinel
//!
//! A coordinate that is an exact multiple of the matching image dimension
//! (including `0`) marks a keypoint as absent. This also hides genuine
//! keypoints lying on the left or top image edge; it is a known limitation
//! of the detector's output convention.

use image::RgbImage;

use super::color::Color;
use super::draw::{draw_antialiased_disc, draw_antialiased_segment};
use super::skeleton::{KPT_COLOR_INDICES, LIMB_COLOR_INDICES, SKELETON, limb_endpoints};
use crate::results::{KEYPOINT_DIM, NUM_KEYPOINTS, POSE_VECTOR_LEN};

/// Minimum keypoint confidence for limbs and for single-point vectors.
pub const KEYPOINT_CONF_THRESHOLD: f32 = 0.5;

/// Keypoint marker radius in pixels.
pub const KEYPOINT_RADIUS: i32 = 5;

/// Skeleton line thickness in pixels.
pub const LIMB_THICKNESS: f32 = 2.0;

/// Number of markers and limbs drawn for one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoseStats {
    /// Keypoint markers drawn.
    pub points: usize,
    /// Skeleton limbs drawn.
    pub limbs: usize,
}

/// Whether `value` sits on the boundary sentinel for an axis of length `extent`.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn is_sentinel(value: f32, extent: u32) -> bool {
    (value as i32) % (extent as i32) == 0
}

/// Whether a keypoint marker should be drawn.
///
/// `vector_len` is the length of the whole keypoint vector; a bare
/// three-value vector additionally needs a confident point.
#[must_use]
pub fn keypoint_visible(x: f32, y: f32, conf: f32, vector_len: usize, shape: (u32, u32)) -> bool {
    if is_sentinel(x, shape.0) || is_sentinel(y, shape.1) {
        return false;
    }
    vector_len != KEYPOINT_DIM || conf >= KEYPOINT_CONF_THRESHOLD
}

/// Whether a limb endpoint is usable for a skeleton line.
#[must_use]
pub fn limb_endpoint_visible(x: f32, y: f32, conf: f32, shape: (u32, u32)) -> bool {
    conf >= KEYPOINT_CONF_THRESHOLD
        && !is_sentinel(x, shape.0)
        && !is_sentinel(y, shape.1)
        && x as i32 >= 0
        && y as i32 >= 0
}

/// Draws keypoints and skeleton lines across a batch of instances.
///
/// Skeleton lines stay enabled only while every instance drawn so far had a
/// full 17-point pose vector. Create one renderer per image.
#[derive(Debug, Clone)]
pub struct PoseRenderer {
    draw_lines: bool,
}

impl Default for PoseRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseRenderer {
    /// Create a renderer with skeleton lines enabled.
    #[must_use]
    pub const fn new() -> Self {
        Self { draw_lines: true }
    }

    /// Draw one instance's keypoints onto `canvas`.
    ///
    /// An empty keypoint vector draws nothing and leaves the line gate untouched.
    #[allow(clippy::cast_possible_truncation)]
    pub fn draw(&mut self, canvas: &mut RgbImage, keypoints: &[f32]) -> PoseStats {
        let mut stats = PoseStats::default();
        let shape = canvas.dimensions();
        if keypoints.is_empty() || shape.0 == 0 || shape.1 == 0 {
            return stats;
        }

        let is_pose = keypoints.len() == POSE_VECTOR_LEN;
        self.draw_lines &= is_pose;

        for (i, kp) in keypoints
            .chunks_exact(KEYPOINT_DIM)
            .take(NUM_KEYPOINTS)
            .enumerate()
        {
            if !keypoint_visible(kp[0], kp[1], kp[2], keypoints.len(), shape) {
                continue;
            }
            let color = if is_pose {
                Color::from_pose_index(KPT_COLOR_INDICES[i])
            } else {
                Color::RED
            };
            let center = (kp[0] as i32, kp[1] as i32);
            draw_antialiased_disc(canvas, center, KEYPOINT_RADIUS, color.to_rgb());
            stats.points += 1;
        }

        if !self.draw_lines {
            return stats;
        }

        for (limb, &color_idx) in LIMB_COLOR_INDICES.iter().enumerate().take(SKELETON.len()) {
            let (a, b) = limb_endpoints(limb);
            let p1 = &keypoints[a * KEYPOINT_DIM..(a + 1) * KEYPOINT_DIM];
            let p2 = &keypoints[b * KEYPOINT_DIM..(b + 1) * KEYPOINT_DIM];
            if !limb_endpoint_visible(p1[0], p1[1], p1[2], shape)
                || !limb_endpoint_visible(p2[0], p2[1], p2[2], shape)
            {
                continue;
            }
            draw_antialiased_segment(
                canvas,
                (p1[0] as i32, p1[1] as i32),
                (p2[0] as i32, p2[1] as i32),
                LIMB_THICKNESS,
                Color::from_pose_index(color_idx).to_rgb(),
            );
            stats.limbs += 1;
        }
        stats
    }
}
