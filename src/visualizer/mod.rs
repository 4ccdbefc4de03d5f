// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Visualization tools for detection results.

/// Color definitions and palettes.
pub mod color;

/// Anti-aliased drawing primitives.
pub mod draw;

/// Keypoint and skeleton rendering.
pub mod pose;

/// Pose skeleton topology and color index tables.
pub mod skeleton;

pub use color::{Color, Palette, generate_color, generate_palette};
pub use pose::{PoseRenderer, PoseStats};
