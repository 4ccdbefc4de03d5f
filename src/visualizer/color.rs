// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use image::Rgb;
use rand::Rng;

use crate::error::{QuadCropError, Result};

/// Color type for visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    /// Red color.
    pub const RED: Color = Color(255, 0, 0);
    /// White color.
    pub const WHITE: Color = Color(255, 255, 255);

    /// Build a color from 1 to 3 generated components.
    ///
    /// Missing trailing components are zero, so a single-channel palette
    /// entry tints only the red channel.
    #[must_use]
    pub fn from_components(components: &[u8]) -> Self {
        let at = |i: usize| components.get(i).copied().unwrap_or(0);
        Self(at(0), at(1), at(2))
    }

    /// Get a color from the pose palette by index.
    #[must_use]
    pub fn from_pose_index(index: usize) -> Self {
        let color = POSE_COLORS[index % POSE_COLORS.len()];
        Self(color[0], color[1], color[2])
    }

    /// Convert to an `image` RGB pixel.
    #[must_use]
    pub const fn to_rgb(self) -> Rgb<u8> {
        Rgb([self.0, self.1, self.2])
    }
}

/// Generate one random color with `channels` independent components in `[0, 255]`.
///
/// # Errors
///
/// Returns [`QuadCropError::InvalidArgument`] when `channels` is outside `1..=3`.
pub fn generate_color<R: Rng + ?Sized>(rng: &mut R, channels: usize) -> Result<Vec<u8>> {
    if !(1..=3).contains(&channels) {
        return Err(QuadCropError::InvalidArgument(format!(
            "Invalid number of channels {channels}. Must be between 1 and 3."
        )));
    }
    Ok((0..channels).map(|_| rng.gen_range(0..=255)).collect())
}

/// Generate `n` independent random colors. Colors are not guaranteed unique.
///
/// # Errors
///
/// Returns [`QuadCropError::InvalidArgument`] when `channels` is outside `1..=3`.
pub fn generate_palette<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    channels: usize,
) -> Result<Vec<Vec<u8>>> {
    (0..n).map(|_| generate_color(rng, channels)).collect()
}

/// Per-run mapping from class index to display color.
///
/// Built once before the first image and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    /// Generate a random palette for `num_classes` classes.
    ///
    /// # Errors
    ///
    /// Returns [`QuadCropError::InvalidArgument`] when `channels` is outside `1..=3`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, num_classes: usize, channels: usize) -> Result<Self> {
        let colors = generate_palette(rng, num_classes, channels)?
            .iter()
            .map(|c| Color::from_components(c))
            .collect();
        Ok(Self { colors })
    }

    /// Wrap an explicit list of colors.
    #[must_use]
    pub const fn from_colors(colors: Vec<Color>) -> Self {
        Self { colors }
    }

    /// Look up the color for a class.
    ///
    /// # Errors
    ///
    /// Returns [`QuadCropError::InvalidArgument`] when the class index is
    /// outside the palette. Callers size the palette to the model's classes.
    pub fn color(&self, class_idx: usize) -> Result<Color> {
        self.colors.get(class_idx).copied().ok_or_else(|| {
            QuadCropError::InvalidArgument(format!(
                "class index {class_idx} outside palette of {} colors",
                self.colors.len()
            ))
        })
    }
}

/// Ultralytics Pose Color Palette
pub const POSE_COLORS: [[u8; 3]; 20] = [
    [255, 128, 0],   // #ff8000
    [255, 153, 51],  // #ff9933
    [255, 178, 102], // #ffb266
    [230, 230, 0],   // #e6e600
    [255, 153, 255], // #ff99ff
    [153, 204, 255], // #99ccff
    [255, 102, 255], // #ff66ff
    [255, 51, 255],  // #ff33ff
    [102, 178, 255], // #66b2ff
    [51, 153, 255],  // #3399ff
    [255, 153, 153], // #ff9999
    [255, 102, 102], // #ff6666
    [255, 51, 51],   // #ff3333
    [153, 255, 153], // #99ff99
    [102, 255, 102], // #66ff66
    [51, 255, 51],   // #33ff33
    [0, 255, 0],     // #00ff00
    [0, 0, 255],     // #0000ff
    [255, 0, 0],     // #ff0000
    [255, 255, 255], // #ffffff
];
