// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Output naming and saving of annotated images and crops.

use std::fs;
use std::path::{Path, PathBuf};

use image::{RgbImage, RgbaImage};

use crate::error::{QuadCropError, Result};

/// Find the next free run directory: `base/prefix`, then `base/prefix2`, `base/prefix3`, ...
#[must_use]
pub fn find_next_run_dir<P: AsRef<Path>>(base: P, prefix: &str) -> PathBuf {
    let base_path = base.as_ref();

    let first = base_path.join(prefix);
    if !first.exists() {
        return first;
    }

    (2..)
        .map(|i| base_path.join(format!("{prefix}{i}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// File name of the `index`-th crop extracted from the image with `stem`.
#[must_use]
pub fn crop_file_name(stem: &str, index: usize) -> String {
    format!("{stem}_{index}.png")
}

/// File stem of `path` as a string.
#[must_use]
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

/// Writes annotated images and crops under their output directories.
#[derive(Debug, Clone)]
pub struct SaveResults {
    save_dir: Option<PathBuf>,
    crop_dir: Option<PathBuf>,
}

impl SaveResults {
    /// Create a saver. `None` disables that output.
    #[must_use]
    pub const fn new(save_dir: Option<PathBuf>, crop_dir: Option<PathBuf>) -> Self {
        Self { save_dir, crop_dir }
    }

    /// Save an annotated image under the source's file name.
    ///
    /// Returns the written path, or `None` when annotated output is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or encoding fails.
    pub fn save_annotated(&self, source: &Path, annotated: &RgbImage) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.save_dir else {
            return Ok(None);
        };
        let filename = source.file_name().ok_or_else(|| {
            QuadCropError::IoError(format!("No file name in {}", source.display()))
        })?;
        let save_path = dir.join(filename);
        ensure_dir(dir)?;
        annotated
            .save(&save_path)
            .map_err(|e| QuadCropError::ImageError(format!("{}: {e}", save_path.display())))?;
        Ok(Some(save_path))
    }

    /// Save a crop as `<stem>_<index>.png`.
    ///
    /// Returns the written path, or `None` when crop output is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or encoding fails.
    pub fn save_crop(&self, stem: &str, index: usize, crop: &RgbaImage) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.crop_dir else {
            return Ok(None);
        };
        let save_path = dir.join(crop_file_name(stem, index));
        ensure_dir(dir)?;
        crop.save_with_format(&save_path, image::ImageFormat::Png)
            .map_err(|e| QuadCropError::ImageError(format!("{}: {e}", save_path.display())))?;
        Ok(Some(save_path))
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            QuadCropError::IoError(format!("Failed to create directory {}: {e}", dir.display()))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_crop_file_name() {
        assert_eq!(crop_file_name("IMG_0001", 0), "IMG_0001_0.png");
        assert_eq!(crop_file_name("a", 12), "a_12.png");
    }

    #[test]
    fn test_find_next_run_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(find_next_run_dir(tmp.path(), "predict"), tmp.path().join("predict"));
        fs::create_dir(tmp.path().join("predict")).unwrap();
        assert_eq!(find_next_run_dir(tmp.path(), "predict"), tmp.path().join("predict2"));
        fs::create_dir(tmp.path().join("predict2")).unwrap();
        assert_eq!(find_next_run_dir(tmp.path(), "predict"), tmp.path().join("predict3"));
    }

    #[test]
    fn test_save_results_writes_both_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = SaveResults::new(
            Some(tmp.path().join("run")),
            Some(tmp.path().join("run/crops")),
        );

        let annotated = RgbImage::new(8, 8);
        let path = saver
            .save_annotated(Path::new("in/photo.png"), &annotated)
            .unwrap()
            .unwrap();
        assert_eq!(path, tmp.path().join("run/photo.png"));
        assert!(path.exists());

        let crop = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 0]));
        let path = saver.save_crop("photo", 0, &crop).unwrap().unwrap();
        assert_eq!(path, tmp.path().join("run/crops/photo_0.png"));
        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.color(), image::ColorType::Rgba8);
    }

    #[test]
    fn test_disabled_outputs_write_nothing() {
        let saver = SaveResults::new(None, None);
        assert!(saver
            .save_annotated(Path::new("a.png"), &RgbImage::new(1, 1))
            .unwrap()
            .is_none());
        assert!(saver.save_crop("a", 0, &RgbaImage::new(1, 1)).unwrap().is_none());
    }
}
