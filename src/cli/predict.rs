// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;

use crate::cli::args::PredictArgs;
use crate::cli::logging::set_verbose;
use crate::detector::{ColorConversion, DetectorConfig, JsonDetector, load_names};
use crate::error::{QuadCropError, Result};
use crate::io::find_next_run_dir;
use crate::pipeline::{ImageReport, Pipeline, PipelineConfig};
use crate::source::Source;
use crate::utils::count_noun;
use crate::{VERSION, error, section, success, verbose, warn};

/// Parent directory of numbered run directories.
const RUNS_DIR: &str = "runs/quadcrop";

/// Annotate images and extract crops, exiting the process on failure.
pub fn run_prediction(args: &PredictArgs) {
    if let Err(e) = predict(args) {
        error!("{e}");
        process::exit(1);
    }
}

/// Palette size: explicit `--classes`, else one past the highest named class.
fn palette_size(classes: Option<usize>, names: &HashMap<usize, String>) -> Result<usize> {
    match classes {
        Some(0) => Err(QuadCropError::ConfigError(
            "--classes must be at least 1".to_string(),
        )),
        Some(n) => Ok(n),
        None => names.keys().max().map(|&m| m + 1).ok_or_else(|| {
            QuadCropError::ConfigError("Provide --names or --classes to size the palette".to_string())
        }),
    }
}

/// Build the pipeline configuration for an output run directory.
fn pipeline_config(args: &PredictArgs, run_dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::new()
        .with_shrink_ratio(args.shrink)
        .with_font_size(args.font_size)
        .with_font_download(true);
    if !args.no_annotated {
        config = config.with_save_dir(run_dir);
    }
    if !args.no_crops {
        config = config.with_crop_dir(run_dir.join("crops"));
    }
    if let Some(font) = &args.font {
        config = config.with_font(font);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    config
}

fn predict(args: &PredictArgs) -> Result<()> {
    set_verbose(args.verbose);

    let names = match &args.names {
        Some(path) => load_names(path)?,
        None => {
            warn!("'names' argument is missing. Labels will show class indices.");
            HashMap::new()
        }
    };
    let num_classes = palette_size(args.classes, &names)?;

    let detector_config = DetectorConfig::new()
        .with_confidence(args.conf)
        .with_iou(args.iou)
        .with_mask_threshold(args.mask_threshold)
        .with_color_conversion(if args.swap_rb {
            ColorConversion::SwapRb
        } else {
            ColorConversion::None
        });

    let run_dir = args
        .output
        .as_ref()
        .map_or_else(|| find_next_run_dir(RUNS_DIR, "predict"), PathBuf::from);
    let config = pipeline_config(args, &run_dir);
    let palette = config.palette(num_classes, args.channels)?;

    println!("quadcrop {VERSION} 🚀 Rust detections from '{}'", args.detections);
    verbose!(
        "palette: {} classes, {} channels, shrink={}",
        num_classes,
        args.channels,
        args.shrink
    );

    let mut pipeline = Pipeline::new(
        JsonDetector::new(&args.detections),
        detector_config,
        config,
        palette,
        names,
    )?;
    let reports = pipeline.run(&Source::from(args.source.as_str()), &args.ext)?;

    if reports.is_empty() {
        warn!("No images processed from '{}'", args.source);
        return Ok(());
    }

    section!("Summary");
    verbose!("{}", run_summary(&reports));
    if pipeline.config().save_dir.is_some() || pipeline.config().crop_dir.is_some() {
        success!("Results saved to {}", run_dir.display());
    }
    Ok(())
}

/// One-line totals across all processed images.
fn run_summary(reports: &[ImageReport]) -> String {
    let detections: usize = reports.iter().map(ImageReport::detections).sum();
    let crops: usize = reports.iter().map(|r| r.crops_extracted).sum();
    let skipped: usize = reports.iter().map(|r| r.skipped.len()).sum();
    format!(
        "{}: {}, {} ({skipped} skipped)",
        count_noun(reports.len(), "image"),
        count_noun(detections, "detection"),
        count_noun(crops, "crop"),
    )
}
