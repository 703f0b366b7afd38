//! Rigcap
//!
//! Records synchronized frame sets from a multi-position camera rig.
//!
//! Features:
//! - One capture thread per rig position and stream
//! - Dumps serialized through a single worker
//! - Interactive `s` (save) / `q` (quit) loop on stdin
//! - Optional live preview mosaic written to a PNG

mod app;
mod command;

use app::{AppBuilder, LoggingConfig};
use clap::Parser;
use rigcap_saver::{SaverConfig, SaverError, parse_prefixes};
use std::error::Error;
use std::path::PathBuf;

/// Rigcap - synchronized multi-camera frame recorder
#[derive(Parser, Debug)]
#[command(name = "rigcap")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with saver settings; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma separated rig positions, e.g. "top,mid,bot"
    #[arg(long)]
    topic_prefixes: Option<String>,

    /// Nominal camera frame rate in Hz
    #[arg(long)]
    sensor_fps: Option<f64>,

    /// Allowed arrival spread within a frame set, in frames
    #[arg(long)]
    max_frames_difference: Option<f64>,

    /// Root directory for dated run folders
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the live preview mosaic to this PNG after every save
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Synthetic frame width
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Synthetic frame height
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Stop each synthetic stream after this many frames
    #[arg(long)]
    frame_limit: Option<u64>,
}

impl Args {
    /// File values first, then explicit flags on top.
    fn saver_config(&self) -> Result<SaverConfig, SaverError> {
        let mut config = match &self.config {
            Some(path) => SaverConfig::from_json_file(path)?,
            None => SaverConfig::default(),
        };
        if let Some(list) = &self.topic_prefixes {
            config.topic_prefixes = parse_prefixes(list)?;
        }
        if let Some(fps) = self.sensor_fps {
            config.sensor_fps = fps;
        }
        if let Some(frames) = self.max_frames_difference {
            config.max_frames_difference = frames;
        }
        if let Some(output) = &self.output {
            config.output_root = output.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = args.saver_config()?;
    AppBuilder::new(config)
        .with_logging(LoggingConfig { level: args.log_level })
        .with_frame_size(args.width, args.height)
        .with_frame_limit(args.frame_limit)
        .with_preview_path(args.preview)
        .run()
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
