//! Command-line argument definitions for the Canopy CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the diagram to load, an optional editing
//! script, where to write the edited diagram, the configuration file and the
//! logging verbosity.

use clap::Parser;

/// Command-line arguments for the Canopy diagram tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input diagram (TOML payload)
    #[arg(help = "Path to the input diagram")]
    pub input: String,

    /// Path to an editing script (TOML) applied after loading
    #[arg(short, long)]
    pub script: Option<String>,

    /// Path to write the edited diagram to (TOML payload)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
