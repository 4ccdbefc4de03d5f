// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Example showing how to plug a custom detector into the pipeline.
//!
//! A synthetic panel is drawn onto a gradient image, a detector reports it
//! with a full mask and a pose vector, and the pipeline writes the annotated
//! image and the panel crop to `runs/demo`.

use std::collections::HashMap;
use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array2;
use quadcrop::{
    BoundingBox, Color, DetectionResult, Detector, DetectorConfig, Palette, Pipeline,
    PipelineConfig, Result,
};

/// Reports one fixed panel detection for every image.
struct PanelDetector;

impl Detector for PanelDetector {
    fn detect(
        &mut self,
        _image: &DynamicImage,
        _source: &Path,
        _config: &DetectorConfig,
    ) -> Result<Vec<DetectionResult>> {
        let bbox = BoundingBox::new(120, 80, 240, 160);
        let keypoints = (0..17)
            .flat_map(|i| [130.0 + 13.0 * i as f32, 90.0 + 8.0 * i as f32, 0.9])
            .collect();
        Ok(vec![
            DetectionResult::new(bbox, 0.91, 0)
                .with_mask(Array2::ones((160, 240)))
                .with_keypoints(keypoints),
        ])
    }
}

fn main() -> Result<()> {
    let image = RgbImage::from_fn(480, 320, |x, y| Rgb([(x / 2) as u8, (y / 2) as u8, 96]));
    let image = DynamicImage::ImageRgb8(image);

    let config = PipelineConfig::new()
        .with_save_dir("runs/demo")
        .with_crop_dir("runs/demo/crops");
    let palette = Palette::from_colors(vec![Color(4, 42, 255)]);
    let names = HashMap::from([(0, "panel".to_string())]);

    let mut pipeline = Pipeline::new(
        PanelDetector,
        DetectorConfig::default(),
        config,
        palette,
        names,
    )?;
    let report = pipeline.process_image(&image, Path::new("panel.png"))?;

    println!("{}", report.summary(pipeline.names()));
    for path in &report.crop_paths {
        println!("Saved crop {}", path.display());
    }
    Ok(())
}
