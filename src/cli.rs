use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::export::ExportFormat;

#[derive(Parser, Debug)]
#[command(name = "mlbb-stats", version)]
#[command(about = "Extracts player statistics from MLBB end-of-match screenshots", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ./config.json, then next to the executable)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log file (default: logs/mlbb_stats.log next to the executable)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract statistics from screenshots and export them
    Extract(ExtractArgs),

    /// List the hero catalog, or classify the heroes of one screenshot
    Heroes {
        /// Screenshot whose hero portraits should be classified
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// List resolution profiles, or change them in the configuration file
    Profiles {
        /// Make this profile active and turn off aspect-ratio selection
        #[arg(long)]
        activate: Option<String>,

        /// Turn aspect-ratio selection back on
        #[arg(long, conflicts_with = "activate")]
        auto: bool,

        /// Add or replace a profile from a JSON file
        #[arg(long)]
        import: Option<PathBuf>,

        /// Remove a profile
        #[arg(long)]
        remove: Option<String>,
    },

    /// Write the effective configuration as a sample file
    InitConfig {
        /// Destination file
        path: PathBuf,
    },

    /// Locate Tesseract and download eng.traineddata if missing
    Setup,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["image", "dir"])))]
pub struct ExtractArgs {
    /// Screenshot file(s)
    #[arg(short, long, num_args = 1..)]
    pub image: Vec<PathBuf>,

    /// Directory of screenshots (png/jpg/jpeg)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Output directory (default: output_dir from the configuration)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Export formats
    #[arg(short, long, value_enum, num_args = 1.., default_values_t = [ExportFormat::Csv, ExportFormat::Json])]
    pub format: Vec<ExportFormat>,

    /// Base name of the output files (default: mlbb_stats_<timestamp>)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Only extract the player with this nickname
    #[arg(short, long)]
    pub player: Option<String>,

    /// Worker threads (default: number of cores)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Resolution profile to use instead of aspect-ratio selection
    #[arg(long)]
    pub profile: Option<String>,

    /// Save every crop and processed image to the debug directory
    #[arg(long)]
    pub debug: bool,

    /// Append to an existing CSV file instead of replacing it
    #[arg(long)]
    pub append: bool,

    /// Path to the tesseract executable
    #[arg(long)]
    pub tesseract_cmd: Option<PathBuf>,
}
