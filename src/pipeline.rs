// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-image driver: detect, annotate, extract crops, persist.
//!
//! Images are processed one after another on the calling thread. The class
//! palette and names are read-only for the whole run.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::annotate::{Annotator, DEFAULT_FONT_SIZE, class_name};
use crate::crop::{SHRINK_RATIO, SkipReason, extract_crops};
use crate::detector::{Detector, DetectorConfig};
use crate::error::{QuadCropError, Result};
use crate::io::{SaveResults, file_stem};
use crate::results::DetectionResult;
use crate::source::{Source, SourceIterator};
use crate::utils::count_noun;
use crate::visualizer::Palette;
use crate::{error, verbose, warn};

/// Configuration of the visualization and crop stages.
///
/// # Example
///
/// ```rust
/// use quadcrop::PipelineConfig;
///
/// let config = PipelineConfig::new()
///     .with_shrink_ratio(0.1)
///     .with_save_dir("runs/quadcrop/predict")
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Fraction each quad corner moves toward the centroid (0.0 to 1.0).
    pub shrink_ratio: f32,
    /// Directory for annotated images; `None` disables saving them.
    pub save_dir: Option<PathBuf>,
    /// Directory for crops; `None` disables saving them.
    pub crop_dir: Option<PathBuf>,
    /// Label font file. Without one, see `download_font`.
    pub font: Option<PathBuf>,
    /// Fetch the default label font when `font` is unset.
    pub download_font: bool,
    /// Label font size in pixels.
    pub font_size: f32,
    /// Seed for the class palette; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shrink_ratio: SHRINK_RATIO,
            save_dir: None,
            crop_dir: None,
            font: None,
            download_font: true,
            font_size: DEFAULT_FONT_SIZE,
            seed: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the quad shrink ratio.
    #[must_use]
    pub const fn with_shrink_ratio(mut self, ratio: f32) -> Self {
        self.shrink_ratio = ratio;
        self
    }

    /// Save annotated images into `dir`.
    #[must_use]
    pub fn with_save_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.save_dir = Some(dir.into());
        self
    }

    /// Save crops into `dir`.
    #[must_use]
    pub fn with_crop_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.crop_dir = Some(dir.into());
        self
    }

    /// Use a local label font.
    #[must_use]
    pub fn with_font<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.font = Some(path.into());
        self
    }

    /// Enable or disable fetching the default font.
    #[must_use]
    pub const fn with_font_download(mut self, download: bool) -> Self {
        self.download_font = download;
        self
    }

    /// Set the label font size.
    #[must_use]
    pub const fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    /// Seed the class palette.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`QuadCropError::ConfigError`] for an out-of-range value.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.shrink_ratio) {
            return Err(QuadCropError::ConfigError(format!(
                "shrink={} must be within [0, 1]",
                self.shrink_ratio
            )));
        }
        if self.font_size <= 0.0 || !self.font_size.is_finite() {
            return Err(QuadCropError::ConfigError(format!(
                "font size {} must be positive",
                self.font_size
            )));
        }
        Ok(())
    }

    /// Generate the run's class palette.
    ///
    /// # Errors
    ///
    /// Returns [`QuadCropError::InvalidArgument`] if `channels` is outside `1..=3`.
    pub fn palette(&self, num_classes: usize, channels: usize) -> Result<Palette> {
        let mut rng = self
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Palette::random(&mut rng, num_classes, channels)
    }

    /// Build the label annotator for this configuration.
    ///
    /// Resolves `font`, or the cached default font when downloading is
    /// enabled. Without a usable font labels are skipped, with a warning.
    #[must_use]
    pub fn annotator(&self) -> Annotator {
        let annotator = if self.font.is_some() || self.download_font {
            Annotator::with_font_file(self.font.as_deref(), self.font_size)
        } else {
            Annotator::new(None, self.font_size)
        };
        if !annotator.has_font() {
            warn!("No label font available, labels will be skipped");
        }
        annotator
    }
}

/// What happened to one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReport {
    /// Source image path.
    pub source: PathBuf,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Detections per class index.
    pub class_counts: BTreeMap<usize, usize>,
    /// Crops extracted, whether or not they were saved.
    pub crops_extracted: usize,
    /// Instances that produced no crop, in detection order.
    pub skipped: Vec<SkipReason>,
    /// Where the annotated image was written.
    pub annotated_path: Option<PathBuf>,
    /// Where crops were written, in index order.
    pub crop_paths: Vec<PathBuf>,
}

impl ImageReport {
    /// Total number of detections.
    #[must_use]
    pub fn detections(&self) -> usize {
        self.class_counts.values().sum()
    }

    /// Console summary such as `"2 cracks, 1 spall, 2 crops"`.
    #[must_use]
    pub fn summary(&self, names: &HashMap<usize, String>) -> String {
        let mut parts: Vec<String> = self
            .class_counts
            .iter()
            .map(|(&idx, &count)| count_noun(count, &class_name(names, idx)))
            .collect();
        if parts.is_empty() {
            parts.push("(no detections)".to_string());
        }
        parts.push(count_noun(self.crops_extracted, "crop"));
        parts.join(", ")
    }
}

/// Runs detection, annotation and crop extraction over images.
pub struct Pipeline<D: Detector> {
    detector: D,
    detector_config: DetectorConfig,
    config: PipelineConfig,
    annotator: Annotator,
    palette: Palette,
    names: HashMap<usize, String>,
    saver: SaveResults,
}

impl<D: Detector> Pipeline<D> {
    /// Create a pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if either configuration is invalid.
    pub fn new(
        detector: D,
        detector_config: DetectorConfig,
        config: PipelineConfig,
        palette: Palette,
        names: HashMap<usize, String>,
    ) -> Result<Self> {
        detector_config.validate()?;
        config.validate()?;
        let annotator = config.annotator();
        let saver = SaveResults::new(config.save_dir.clone(), config.crop_dir.clone());
        Ok(Self {
            detector,
            detector_config,
            config,
            annotator,
            palette,
            names,
            saver,
        })
    }

    /// Class names used for labels.
    #[must_use]
    pub const fn names(&self) -> &HashMap<usize, String> {
        &self.names
    }

    /// Run configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detect and annotate one image without writing anything.
    ///
    /// Returns the annotated image together with the source pixels as RGB.
    ///
    /// # Errors
    ///
    /// Returns an error if detection fails or a class index is outside the palette.
    pub fn annotate(
        &mut self,
        image: &DynamicImage,
        source: &Path,
    ) -> Result<(RgbImage, Vec<DetectionResult>)> {
        let input = self.detector_config.color_conversion.apply(image);
        let results = self.detector.detect(&input, source, &self.detector_config)?;
        let annotated = self
            .annotator
            .plot_results(image, &results, &self.palette, &self.names)?;
        Ok((annotated, results))
    }

    /// Process one image end to end and persist its outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if detection, rendering or saving fails.
    pub fn process_image(&mut self, image: &DynamicImage, source: &Path) -> Result<ImageReport> {
        let (annotated, results) = self.annotate(image, source)?;
        let crops = extract_crops(&image.to_rgb8(), &results, self.config.shrink_ratio);

        let annotated_path = self.saver.save_annotated(source, &annotated)?;
        let stem = file_stem(source);
        let mut crop_paths = Vec::new();
        for (index, crop) in crops.crops() {
            if let Some(path) = self.saver.save_crop(&stem, index, crop)? {
                crop_paths.push(path);
            }
        }

        let mut class_counts = BTreeMap::new();
        for det in &results {
            *class_counts.entry(det.class_idx).or_insert(0) += 1;
        }
        let skipped = crops.skipped().collect();

        Ok(ImageReport {
            source: source.to_path_buf(),
            width: image.width(),
            height: image.height(),
            class_counts,
            crops_extracted: crops.extracted(),
            skipped,
            annotated_path,
            crop_paths,
        })
    }

    /// Process every image of `source`, reporting progress per image.
    ///
    /// Images that fail to load or process are reported and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the source itself cannot be resolved.
    pub fn run(&mut self, source: &Source, extensions: &[String]) -> Result<Vec<ImageReport>> {
        let iter = SourceIterator::new(source, extensions)?;
        let mut reports = Vec::with_capacity(iter.total());
        for (meta, image) in iter {
            let name = meta.path.display();
            let report = image.and_then(|img| self.process_image(&img, &meta.path));
            match report {
                Ok(report) => {
                    verbose!(
                        "image {}/{} {name}: {}x{} {}",
                        meta.index + 1,
                        meta.total,
                        report.width,
                        report.height,
                        report.summary(&self.names)
                    );
                    reports.push(report);
                }
                Err(e) => error!("image {}/{} {name}: {e}", meta.index + 1, meta.total),
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::BoundingBox;
    use crate::visualizer::Color;
    use ndarray::Array2;

    /// Returns a fixed detection list for every image.
    struct FixedDetector(Vec<DetectionResult>);

    impl Detector for FixedDetector {
        fn detect(
            &mut self,
            _image: &DynamicImage,
            _source: &Path,
            _config: &DetectorConfig,
        ) -> Result<Vec<DetectionResult>> {
            Ok(self.0.clone())
        }
    }

    fn pipeline(results: Vec<DetectionResult>, config: PipelineConfig) -> Pipeline<FixedDetector> {
        let palette = Palette::from_colors(vec![Color(255, 0, 0), Color(0, 0, 255)]);
        let names = HashMap::from([(0, "crack".to_string()), (1, "spall".to_string())]);
        Pipeline::new(
            FixedDetector(results),
            DetectorConfig::default(),
            config.with_font_download(false),
            palette,
            names,
        )
        .unwrap()
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = PipelineConfig::default();
        assert!((config.shrink_ratio - 0.05).abs() < f32::EPSILON);
        assert!((config.font_size - 16.0).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
        assert!(PipelineConfig::new().with_shrink_ratio(1.5).validate().is_err());
        assert!(PipelineConfig::new().with_font_size(0.0).validate().is_err());
    }

    #[test]
    fn test_annotator_font_resolution() {
        assert!(PipelineConfig::default().download_font);

        let offline = PipelineConfig::new().with_font_download(false);
        assert!(!offline.annotator().has_font());

        let fixture = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSans.ttf");
        let local = offline.clone().with_font(fixture);
        assert!(local.annotator().has_font());

        let missing = offline.with_font("does/not/exist.ttf");
        assert!(!missing.annotator().has_font());
    }

    #[test]
    fn test_seeded_palette_is_reproducible() {
        let config = PipelineConfig::new().with_seed(7);
        assert_eq!(config.palette(5, 3).unwrap(), config.palette(5, 3).unwrap());
        assert!(config.palette(5, 4).is_err());
    }

    #[test]
    fn test_report_counts_and_skips() {
        let results = vec![
            DetectionResult::new(BoundingBox::new(5, 5, 40, 40), 0.9, 0)
                .with_mask(Array2::ones((40, 40))),
            DetectionResult::new(BoundingBox::new(50, 5, 20, 20), 0.8, 0),
            DetectionResult::new(BoundingBox::new(5, 50, 20, 20), 0.7, 1)
                .with_mask(Array2::zeros((20, 20))),
        ];
        let mut pipeline = pipeline(results, PipelineConfig::new());
        let image = DynamicImage::new_rgb8(100, 100);
        let report = pipeline.process_image(&image, Path::new("x.png")).unwrap();

        assert_eq!(report.detections(), 3);
        assert_eq!(report.crops_extracted, 1);
        assert_eq!(report.skipped, vec![SkipReason::NoMask, SkipReason::NoContour]);
        assert!(report.annotated_path.is_none());
        assert!(report.crop_paths.is_empty());
        assert_eq!(report.summary(pipeline.names()), "2 cracks, 1 spall, 1 crop");
    }

    #[test]
    fn test_no_detections_summary() {
        let mut pipeline = pipeline(vec![], PipelineConfig::new());
        let report = pipeline
            .process_image(&DynamicImage::new_rgb8(8, 8), Path::new("x.png"))
            .unwrap();
        assert_eq!(report.summary(pipeline.names()), "(no detections), 0 crops");
    }

    #[test]
    fn test_run_skips_unreadable_images() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("broken.png"), b"nope").unwrap();
        DynamicImage::new_rgb8(16, 16)
            .save(tmp.path().join("ok.png"))
            .unwrap();

        let out = tmp.path().join("out");
        let mut pipeline = pipeline(vec![], PipelineConfig::new().with_save_dir(&out));
        let reports = pipeline
            .run(&Source::Directory(tmp.path().to_path_buf()), &[])
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert!(out.join("ok.png").exists());
    }
}
