use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera - virtual globe tile streaming engine")]
#[command(version)]
#[command(long_about = "
Tessera decides which imagery or elevation tiles a viewpoint needs, streams
them into bounded LRU caches, and substitutes coarser ancestor imagery while
finer tiles are still in flight.

Examples:
  tessera probe --source blue-marble.json
  tessera probe --source blue-marble.json --resolution 0.02
  tessera prefetch --source blue-marble.json --root tiles/ --lat 46.8 --lon 9.5 --altitude 50000
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tessellation frames against a viewpoint and fetch the working set
    Prefetch {
        /// Tile source configuration (JSON)
        #[arg(long)]
        source: PathBuf,

        /// Root directory holding the tile payloads
        #[arg(long)]
        root: PathBuf,

        /// Eye latitude in degrees
        #[arg(long)]
        lat: f64,

        /// Eye longitude in degrees
        #[arg(long)]
        lon: f64,

        /// Eye altitude in meters
        #[arg(long, default_value = "1000000")]
        altitude: f64,

        /// Visible-region radius in degrees around the eye point
        #[arg(long, default_value = "10")]
        radius: f64,

        /// Viewport height in pixels
        #[arg(long, default_value = "600")]
        viewport_height: u32,

        /// Vertical field of view in degrees
        #[arg(long, default_value = "45")]
        fov: f64,

        /// Detail factor (1.0 = one texel per pixel, larger = coarser)
        #[arg(long, default_value = "1")]
        detail: f64,

        /// Give up after this many frames
        #[arg(long, default_value = "64")]
        max_frames: u32,
    },

    /// Print a source's resolution pyramid
    Probe {
        /// Tile source configuration (JSON)
        #[arg(long)]
        source: PathBuf,

        /// Report the level selected for this texel size (degrees per pixel)
        #[arg(long)]
        resolution: Option<f64>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Prefetch {
            source,
            root,
            lat,
            lon,
            altitude,
            radius,
            viewport_height,
            fov,
            detail,
            max_frames,
        } => commands::prefetch::execute(commands::prefetch::PrefetchArgs {
            source,
            root,
            lat,
            lon,
            altitude,
            radius,
            viewport_height,
            fov,
            detail,
            max_frames,
        }),
        Commands::Probe { source, resolution } => commands::probe::execute(source, resolution),
    }
}
