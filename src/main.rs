// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "filter-camera")]
#[command(about = "Camera with live preview and photo filters")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Stream this image file instead of a camera
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Render filters on the CPU instead of the GPU
    #[arg(long, global = true)]
    cpu: bool,

    /// Config file (default: ~/.config/filter-camera/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive camera in the terminal (default)
    Ui,

    /// List available cameras
    List,

    /// List available filters
    Filters,

    /// Take a filtered photo without the UI
    Photo {
        /// Filter to apply (see 'filter-camera filters')
        #[arg(short, long, default_value = "none")]
        filter: String,

        /// Output file path (default: a new picture in the album)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Camera device path (/dev/videoN, PipeWire node id, or 'test')
        #[arg(short, long)]
        camera: Option<String>,

        /// Open the photo in the default image viewer
        #[arg(long)]
        open: bool,
    },

    /// Apply a filter to an existing image
    Apply {
        /// Image to filter
        input: PathBuf,

        /// Filter to apply
        #[arg(short, long)]
        filter: String,

        /// Output file path (default: <input>-<filter>.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Open the result in the default image viewer
        #[arg(long)]
        open: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, None | Some(Commands::Ui));

    // RUST_LOG controls the level, e.g. RUST_LOG=filter_camera=debug
    cli::init_logging(interactive);

    let options = cli::Options {
        source: cli.source,
        force_cpu: cli.cpu,
        config_path: cli.config,
    };

    match cli.command {
        None | Some(Commands::Ui) => cli::run_interactive(&options),
        Some(Commands::List) => cli::list_cameras(&options),
        Some(Commands::Filters) => cli::list_filters(),
        Some(Commands::Photo {
            filter,
            output,
            camera,
            open,
        }) => cli::take_photo(&options, &filter, output, camera, open),
        Some(Commands::Apply {
            input,
            filter,
            output,
            open,
        }) => cli::apply_filter(&options, &input, &filter, output, open),
    }
}
