// SPDX-License-Identifier: GPL-3.0-only

use camera3a::FlashMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera3a")]
#[command(about = "3A orchestration core for camera pipelines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted session against the simulated camera
    Simulate {
        /// Number of frames to run
        #[arg(short, long, default_value = "30")]
        frames: u32,

        /// Exposure delay reported by the simulated sensor (0 = not reported)
        #[arg(long, default_value = "2")]
        exposure_delay: u32,

        /// Send an AE precapture trigger with this frame's request
        #[arg(long)]
        precapture_at: Option<u32>,

        /// Low-light scene (AE wants flash)
        #[arg(long)]
        dark: bool,

        /// The flash never shows up in frame status
        #[arg(long)]
        flash_fails: bool,

        /// Flash mode for every request
        #[arg(long, value_enum, default_value = "auto")]
        flash: FlashArg,

        /// Also drive the flash LEDs found in this LED class directory
        /// (e.g. /sys/class/leds)
        #[arg(long)]
        leds: Option<PathBuf>,

        /// Config file (default: ~/.config/camera3a/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Config file (default: ~/.config/camera3a/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FlashArg {
    Off,
    Auto,
    On,
    Single,
    Torch,
}

impl From<FlashArg> for FlashMode {
    fn from(arg: FlashArg) -> Self {
        match arg {
            FlashArg::Off => FlashMode::Off,
            FlashArg::Auto => FlashMode::Auto,
            FlashArg::On => FlashMode::On,
            FlashArg::Single => FlashMode::Single,
            FlashArg::Torch => FlashMode::Torch,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera3a=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            frames,
            exposure_delay,
            precapture_at,
            dark,
            flash_fails,
            flash,
            leds,
            config,
        } => cli::simulate(cli::SimulateOptions {
            frames,
            exposure_delay,
            precapture_at,
            dark,
            flash_fails,
            flash_mode: flash.into(),
            leds,
            config,
        }),
        Commands::Config { config } => cli::show_config(config),
    }
}
