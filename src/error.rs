// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the visualization and crop library.

use std::fmt;

/// Result type alias for quadcrop operations.
pub type Result<T> = std::result::Result<T, QuadCropError>;

/// Main error type for the quadcrop library.
#[derive(Debug)]
pub enum QuadCropError {
    /// Caller passed a value outside the accepted range.
    InvalidArgument(String),
    /// Error decoding, encoding or processing images.
    ImageError(String),
    /// IO error (file not found, permission denied, etc.).
    IoError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
    /// Invalid configuration provided.
    ConfigError(String),
    /// The detector could not produce results for an image.
    DetectorError(String),
    /// Error downloading an asset.
    DownloadError(String),
    /// Error loading or parsing a font.
    FontError(String),
}

impl fmt::Display for QuadCropError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::DetectorError(msg) => write!(f, "Detector error: {msg}"),
            Self::DownloadError(msg) => write!(f, "Download error: {msg}"),
            Self::FontError(msg) => write!(f, "Font error: {msg}"),
        }
    }
}

impl std::error::Error for QuadCropError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for QuadCropError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for QuadCropError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<serde_json::Error> for QuadCropError {
    fn from(err: serde_json::Error) -> Self {
        Self::DetectorError(format!("Malformed detection file: {err}"))
    }
}
