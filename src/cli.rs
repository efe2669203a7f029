use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dermascope::segmentation::{DEFAULT_ARCHITECTURE, DEFAULT_ENCODER, DEFAULT_THRESHOLD};
use dermascope::ComputeDevice;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Label the applicator template with a panel's allergens
    Overlay {
        /// Applicator template image
        #[arg(long, default_value = "applicator.png")]
        template: PathBuf,

        /// Panel to render (A, B, C or D)
        #[arg(long, default_value = "A")]
        panel: String,

        /// Comma separated allergen names, overriding the panel's labels
        #[arg(long, value_delimiter = ',')]
        labels: Option<Vec<String>>,

        /// JSON file with panel labels keyed by panel letter
        #[arg(long)]
        panels: Option<PathBuf>,

        /// TrueType font for the labels (embedded bitmap font if omitted)
        #[arg(long)]
        font: Option<PathBuf>,

        /// Font size in pixels when --font is given
        #[arg(long, default_value_t = 16.0)]
        font_size: f32,

        /// Where to write the labelled template
        #[arg(short, long, default_value = "temp/allergen_overlay.png")]
        output: PathBuf,
    },

    /// Segment a skin-test photograph and write the overlay composite
    Analyze {
        /// Photograph of the test area
        #[arg(long)]
        photo: PathBuf,

        /// ONNX export of the trained segmentation network
        #[arg(long, default_value = "segmentation_model_final.onnx")]
        checkpoint: PathBuf,

        #[arg(long, default_value = DEFAULT_ARCHITECTURE)]
        architecture: String,

        #[arg(long, default_value = DEFAULT_ENCODER)]
        encoder: String,

        #[arg(long, value_enum, default_value_t = ComputeDevice::Auto)]
        device: ComputeDevice,

        /// Foreground probability threshold
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f32,

        /// Give up on inference after this many seconds (0 waits forever)
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,

        /// Where to write the segmented composite
        #[arg(short, long, default_value = "temp/segmented_image.png")]
        output: PathBuf,
    },
}
