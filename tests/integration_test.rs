// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end tests: sidecar detections in, annotated image and crops out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use serde_json::json;

use quadcrop::annotate::{class_name, format_label};
use quadcrop::{
    DetectorConfig, JsonDetector, Pipeline, PipelineConfig, SkipReason, Source,
};

/// Writes a gradient test image and a detection sidecar for it.
fn setup(dir: &Path, detections: &serde_json::Value) -> PathBuf {
    let image = RgbImage::from_fn(640, 480, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let image_path = dir.join("IMG_0001.png");
    image.save(&image_path).unwrap();

    let det_dir = dir.join("dets");
    std::fs::create_dir_all(&det_dir).unwrap();
    std::fs::write(det_dir.join("IMG_0001.json"), detections.to_string()).unwrap();
    image_path
}

fn crack_names() -> HashMap<usize, String> {
    HashMap::from([(0, "crack".to_string())])
}

const FIXTURE_FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSans.ttf");

fn build_pipeline(dir: &Path) -> Pipeline<JsonDetector> {
    let run = dir.join("run");
    let config = PipelineConfig::new()
        .with_font(FIXTURE_FONT)
        .with_save_dir(&run)
        .with_crop_dir(run.join("crops"))
        .with_seed(0);
    let palette = config.palette(1, 3).unwrap();
    Pipeline::new(
        JsonDetector::new(dir.join("dets")),
        DetectorConfig::default(),
        config,
        palette,
        crack_names(),
    )
    .unwrap()
}

#[test]
fn test_rectangle_mask_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let detections = json!([{
        "bbox": [10, 10, 100, 100],
        "class_idx": 0,
        "confidence": 0.87,
        "mask": vec![vec![1.0_f32; 100]; 100],
    }]);
    let image_path = setup(tmp.path(), &detections);
    let source = image::open(&image_path).unwrap();

    let mut pipeline = build_pipeline(tmp.path());
    let report = pipeline.process_image(&source, &image_path).unwrap();

    assert_eq!(report.detections(), 1);
    assert_eq!(report.crops_extracted, 1);
    assert!(report.skipped.is_empty());
    assert_eq!(
        format_label(&class_name(pipeline.names(), 0), 0.87),
        "crack 0.87"
    );

    // Box edges keep the class color after the blend; far pixels are untouched.
    let class_color = pipeline
        .config()
        .palette(1, 3)
        .unwrap()
        .color(0)
        .unwrap()
        .to_rgb();
    let annotated = image::open(report.annotated_path.unwrap()).unwrap().to_rgb8();
    assert_eq!(annotated.dimensions(), (640, 480));
    assert_eq!(*annotated.get_pixel(10, 60), class_color);
    assert_eq!(*annotated.get_pixel(11, 60), class_color);
    assert_eq!(*annotated.get_pixel(109, 60), class_color);
    assert_eq!(*annotated.get_pixel(60, 109), class_color);
    assert_eq!(*annotated.get_pixel(300, 300), *source.to_rgb8().get_pixel(300, 300));

    // Label background directly above the box's top-left corner.
    let src = source.to_rgb8();
    assert_ne!(*annotated.get_pixel(9, 9), *src.get_pixel(9, 9));
    assert_ne!(*annotated.get_pixel(9, 0), *src.get_pixel(9, 0));
    assert_eq!(*annotated.get_pixel(8, 9), *src.get_pixel(8, 9));

    // Exactly one transparent-background crop.
    assert_eq!(report.crop_paths.len(), 1);
    let crop_path = &report.crop_paths[0];
    assert_eq!(crop_path.file_name().unwrap(), "IMG_0001_0.png");
    let crop = image::open(crop_path).unwrap();
    assert_eq!(crop.color(), image::ColorType::Rgba8);
    assert_eq!(crop.dimensions(), (100, 100));

    let crop = crop.to_rgba8();
    let opaque = crop.pixels().filter(|p| p[3] == 255).count();
    assert!(opaque > 0);
    assert!(opaque < 100 * 100);
    assert_eq!(crop.get_pixel(0, 0)[3], 0);
    assert_eq!(crop.get_pixel(99, 99)[3], 0);

    // Opaque pixels come from the source, not the annotated image.
    let center = crop.get_pixel(50, 50);
    let expected = src.get_pixel(60, 60);
    assert_eq!([center[0], center[1], center[2]], expected.0);
}

#[test]
fn test_empty_mask_produces_no_crop() {
    let tmp = tempfile::tempdir().unwrap();
    let detections = json!([
        {"bbox": [10, 10, 100, 100], "class_idx": 0, "confidence": 0.87},
        {"bbox": [200, 200, 50, 50], "class_idx": 0, "confidence": 0.9,
         "mask": vec![vec![0.0_f32; 50]; 50]},
    ]);
    let image_path = setup(tmp.path(), &detections);
    let source = image::open(&image_path).unwrap();

    let mut pipeline = build_pipeline(tmp.path());
    let report = pipeline.process_image(&source, &image_path).unwrap();

    assert_eq!(report.detections(), 2);
    assert_eq!(report.crops_extracted, 0);
    assert_eq!(report.skipped, vec![SkipReason::NoMask, SkipReason::NoContour]);
    assert!(report.crop_paths.is_empty());
    assert!(!tmp.path().join("run/crops/IMG_0001_0.png").exists());
    assert!(report.annotated_path.unwrap().exists());
}

#[test]
fn test_later_instances_still_cropped_after_a_skip() {
    let tmp = tempfile::tempdir().unwrap();
    let detections = json!([
        {"bbox": [300, 300, 40, 40], "class_idx": 0, "confidence": 0.95,
         "mask": vec![vec![0.0_f32; 40]; 40]},
        {"bbox": [10, 10, 60, 40], "class_idx": 0, "confidence": 0.8,
         "mask": vec![vec![1.0_f32; 60]; 40]},
    ]);
    let image_path = setup(tmp.path(), &detections);

    let mut pipeline = build_pipeline(tmp.path());
    let reports = pipeline
        .run(&Source::Image(image_path), &[])
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].crops_extracted, 1);
    let crop = image::open(tmp.path().join("run/crops/IMG_0001_0.png")).unwrap();
    assert_eq!(crop.dimensions(), (60, 40));
}

#[test]
fn test_low_confidence_detections_are_filtered_before_drawing() {
    let tmp = tempfile::tempdir().unwrap();
    let detections = json!([
        {"bbox": [10, 10, 100, 100], "class_idx": 0, "confidence": 0.1},
    ]);
    let image_path = setup(tmp.path(), &detections);
    let source = image::open(&image_path).unwrap();

    let mut pipeline = build_pipeline(tmp.path());
    let report = pipeline.process_image(&source, &image_path).unwrap();
    assert_eq!(report.detections(), 0);

    let annotated = image::open(report.annotated_path.unwrap()).unwrap();
    assert_eq!(annotated.to_rgb8(), source.to_rgb8());
    assert!(matches!(annotated, DynamicImage::ImageRgb8(_)));
}
