// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]

//! # quadcrop
//!
//! Detection result visualization and quadrilateral crop extraction for
//! YOLO segmentation and pose outputs.
//!
//! Given an image and the detections a model produced for it, the library:
//!
//! - draws boxes, `"<name> <conf>"` labels and blended mask tints,
//! - draws pose keypoints and skeleton limbs for 17-point pose vectors,
//! - extracts one transparent-background crop per instance mask, cut along
//!   the mask's four extreme corners pulled slightly toward their centroid.
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::path::Path;
//!
//! use quadcrop::{DetectorConfig, JsonDetector, Pipeline, PipelineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let names = HashMap::from([(0, "crack".to_string())]);
//!     let config = PipelineConfig::new()
//!         .with_save_dir("runs/quadcrop/predict")
//!         .with_crop_dir("runs/quadcrop/predict/crops")
//!         .with_seed(0);
//!     let palette = config.palette(names.len(), 3)?;
//!
//!     let mut pipeline = Pipeline::new(
//!         JsonDetector::new("detections"),
//!         DetectorConfig::default(),
//!         config,
//!         palette,
//!         names,
//!     )?;
//!
//!     let image = image::open("IMG_0001.JPG")?;
//!     let report = pipeline.process_image(&image, Path::new("IMG_0001.JPG"))?;
//!     println!("{} crops", report.crops_extracted);
//!     Ok(())
//! }
//! ```
//!
//! ## Quick Start (CLI)
//!
//! ```bash
//! quadcrop predict --source images/ --detections detections/ --names names.json --ext JPG
//! ```
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
pub mod annotate;
pub mod cli;
pub mod crop;
pub mod detector;
pub mod download;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod results;
pub mod source;
pub mod utils;
pub mod visualizer;

// Re-export main types for convenience
pub use annotate::{Annotator, plot_keypoints};
pub use crop::{CropOutcome, CropReport, Quad, SkipReason, extract_crops, extract_quad_crop};
pub use detector::{ColorConversion, Detector, DetectorConfig, JsonDetector};
pub use error::{QuadCropError, Result};
pub use pipeline::{ImageReport, Pipeline, PipelineConfig};
pub use results::{BoundingBox, DetectionResult};
pub use source::{Source, SourceIterator, SourceMeta};
pub use visualizer::{Color, Palette, PoseRenderer};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
