// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Input image enumeration.
//!
//! A [`Source`] resolves to a sorted list of image paths, filtered by file
//! extension (case-insensitive). [`SourceIterator`] then decodes them one at a
//! time.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{QuadCropError, Result};

/// Extensions accepted when no explicit filter is configured.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Represents different input sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Path to an image file.
    Image(PathBuf),
    /// List of image paths.
    ImageList(Vec<PathBuf>),
    /// Directory containing images (not recursive).
    Directory(PathBuf),
    /// Glob pattern such as `dir/*.JPG`.
    Glob(String),
}

impl Source {
    /// Resolve the source into a sorted list of image paths.
    ///
    /// `extensions` filters directory and glob entries; an empty slice falls
    /// back to [`IMAGE_EXTENSIONS`]. Explicit image paths are not filtered.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be read or a named file is missing.
    pub fn resolve(&self, extensions: &[String]) -> Result<Vec<PathBuf>> {
        match self {
            Self::Image(path) => {
                if !path.is_file() {
                    return Err(QuadCropError::IoError(format!(
                        "Image not found: {}",
                        path.display()
                    )));
                }
                Ok(vec![path.clone()])
            }
            Self::ImageList(paths) => Ok(paths.clone()),
            Self::Directory(dir) => collect_images_from_dir(dir, extensions),
            Self::Glob(pattern) => collect_images_from_glob(pattern, extensions),
        }
    }
}

/// Convert from a string path to Source.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        if s.contains('*') {
            return Self::Glob(s.to_string());
        }
        let path = PathBuf::from(s);
        if path.is_dir() {
            return Self::Directory(path);
        }
        Self::Image(path)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

impl From<Vec<PathBuf>> for Source {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::ImageList(paths)
    }
}

/// Whether `path` has one of `extensions` (case-insensitive, without the dot).
///
/// An empty filter accepts the [`IMAGE_EXTENSIONS`].
#[must_use]
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
        return false;
    };
    if extensions.is_empty() {
        return IMAGE_EXTENSIONS.contains(&ext.as_str());
    }
    extensions
        .iter()
        .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&ext))
}

/// Collect image paths from a directory.
fn collect_images_from_dir(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(QuadCropError::IoError(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension(path, extensions))
        .collect();

    paths.sort();
    Ok(paths)
}

/// Collect image paths from a simple `dir/*.ext` glob pattern.
fn collect_images_from_glob(pattern: &str, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let Some(star_pos) = pattern.find('*') else {
        return Ok(vec![PathBuf::from(pattern)]);
    };
    let dir_part = &pattern[..star_pos];
    let dir = if dir_part.is_empty() {
        Path::new(".")
    } else {
        Path::new(dir_part.trim_end_matches('/').trim_end_matches('\\'))
    };

    match pattern[star_pos..].strip_prefix("*.") {
        Some(ext) => collect_images_from_dir(dir, &[ext.to_string()]),
        None => collect_images_from_dir(dir, extensions),
    }
}

/// Metadata about one source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMeta {
    /// Zero-based position in the source.
    pub index: usize,
    /// Total number of images in the source.
    pub total: usize,
    /// Path the image was loaded from.
    pub path: PathBuf,
}

/// Decodes source images one at a time.
#[derive(Debug)]
pub struct SourceIterator {
    paths: std::vec::IntoIter<PathBuf>,
    index: usize,
    total: usize,
}

impl SourceIterator {
    /// Resolve `source` and prepare to iterate over its images.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be resolved.
    pub fn new(source: &Source, extensions: &[String]) -> Result<Self> {
        let paths = source.resolve(extensions)?;
        Ok(Self {
            total: paths.len(),
            paths: paths.into_iter(),
            index: 0,
        })
    }

    /// Number of images in the source.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for SourceIterator {
    type Item = (SourceMeta, Result<DynamicImage>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        let meta = SourceMeta {
            index: self.index,
            total: self.total,
            path,
        };
        self.index += 1;
        let image = image::open(&meta.path).map_err(|e| {
            QuadCropError::ImageError(format!("Failed to load {}: {e}", meta.path.display()))
        });
        Some((meta, image))
    }
}
