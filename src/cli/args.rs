// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::{Args, Parser, Subcommand};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    quadcrop predict --source images/ --detections dets/ --names names.json
    quadcrop predict -s images/ -d dets/ --ext JPG --conf 0.3 --shrink 0.05
    quadcrop predict -s photo.jpg -d dets/ --classes 2 --seed 0 --output out/"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Annotate images and extract quadrilateral crops from their detections
    Predict(PredictArgs),
}

/// Arguments for the predict command.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct PredictArgs {
    /// Input source (image, directory, or glob such as "imgs/*.JPG")
    #[arg(short, long)]
    pub source: String,

    /// Directory of per-image detection JSON files (<stem>.json)
    #[arg(short, long)]
    pub detections: String,

    /// JSON file mapping class indices to names, e.g. {"0": "crack"}
    #[arg(long)]
    pub names: Option<String>,

    /// Number of palette classes [default: highest named class + 1]
    #[arg(long)]
    pub classes: Option<usize>,

    /// Color components per palette entry (1 to 3)
    #[arg(long, default_value_t = 3)]
    pub channels: usize,

    /// Comma-separated image extensions to read from directories
    #[arg(long, value_delimiter = ',')]
    pub ext: Vec<String>,

    /// Confidence threshold
    #[arg(long, default_value_t = 0.30)]
    pub conf: f32,

    /// `IoU` threshold for per-class NMS
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Mask binarization threshold
    #[arg(long, default_value_t = 0.5)]
    pub mask_threshold: f32,

    /// Swap red and blue channels before detection
    #[arg(long, default_value_t = false)]
    pub swap_rb: bool,

    /// Fraction each crop corner moves toward the centroid
    #[arg(long, default_value_t = 0.05)]
    pub shrink: f32,

    /// Output directory [default: runs/quadcrop/predict{N}]
    #[arg(short, long)]
    pub output: Option<String>,

    /// Skip writing annotated images
    #[arg(long, default_value_t = false)]
    pub no_annotated: bool,

    /// Skip writing crops
    #[arg(long, default_value_t = false)]
    pub no_crops: bool,

    /// Label font file (TTF/OTF); the default font is downloaded when unset
    #[arg(long)]
    pub font: Option<String>,

    /// Label font size in pixels
    #[arg(long, default_value_t = 16.0)]
    pub font_size: f32,

    /// Seed for the class palette
    #[arg(long)]
    pub seed: Option<u64>,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}
