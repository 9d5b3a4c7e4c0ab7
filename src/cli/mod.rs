//! Command-line interface for the polyclick engine.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Polyclick - polyrhythmic metronome engine
#[derive(Parser, Debug)]
#[command(name = "polyclick")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine settings document (JSON)
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a configuration on the default output device
    Play {
        /// Rhythm configuration document
        config: PathBuf,

        /// Stop after this many seconds (default: until Enter is pressed)
        #[arg(long)]
        seconds: Option<f64>,
    },

    /// Render a configuration offline to a 16-bit stereo WAV file
    Render {
        /// Rhythm configuration document
        config: PathBuf,

        /// Output WAV path
        output: PathBuf,

        /// Length of the render in seconds
        #[arg(short, long)]
        duration: f64,
    },

    /// Check that a configuration loads and can be scheduled
    Validate {
        /// Rhythm configuration document
        config: PathBuf,
    },

    /// Write a starter two-channel configuration
    Init {
        /// Where to write the document
        config: PathBuf,
    },
}
