use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// trailfuse - fuse movement, speech and code records into playback trails
#[derive(Parser, Debug)]
#[command(name = "trailfuse")]
#[command(about = "Fuse movement, speech and code records into playback trails", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./trailfuse.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect the schema and time format of a file and validate its rows
    Inspect(InspectArgs),

    /// Import files and fuse them into per-actor trails
    Fuse(FuseArgs),

    /// Show the resolved configuration and where each value came from
    Config,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// CSV, GPX or KML file
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct FuseArgs {
    /// Movement files (x/y CSV, GPS CSV, GPX or KML); the file name is the actor name
    #[arg(long, short = 'm', num_args = 1..)]
    pub movement: Vec<PathBuf>,

    /// Conversation file with time, speaker and talk columns
    #[arg(long, short = 'c')]
    pub conversation: Option<PathBuf>,

    /// Code files (single-code or multi-code)
    #[arg(long, num_args = 1..)]
    pub codes: Vec<PathBuf>,

    /// Build simplified trails for playback
    #[arg(long)]
    pub simplify: bool,

    /// Report every actor's position at this time (seconds)
    #[arg(long)]
    pub at: Option<f64>,

    /// Write the fused actors as JSON
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Fetch a map background for the GPS bounds and write it here
    #[arg(long)]
    pub map_image: Option<PathBuf>,

    /// Map image width in pixels
    #[arg(long, default_value = "1024")]
    pub map_width: u32,

    /// Map image height in pixels
    #[arg(long, default_value = "1024")]
    pub map_height: u32,

    /// Override the movement down-sampling interval (seconds)
    #[arg(long)]
    pub movement_sample_interval: Option<f64>,

    /// Override the simplifier minimum distance
    #[arg(long)]
    pub min_distance: Option<f64>,

    /// Override the simplifier maximum time gap (seconds)
    #[arg(long)]
    pub max_time_gap: Option<f64>,

    /// Aggressive simplification
    #[arg(long)]
    pub aggressive: bool,

    /// Override the GPS spike speed limit (km/h)
    #[arg(long)]
    pub max_speed_kmh: Option<f64>,

    /// Override the static map URL template
    #[arg(long)]
    pub map_provider_url: Option<String>,
}
