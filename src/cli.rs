//! CLI argument parsing for Perfdelta

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for change reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "perfdelta")]
#[command(version)]
#[command(about = "Detect performance changes between profiles", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare a target profile against a baseline profile
    Diff {
        /// Baseline profile (JSON)
        baseline: PathBuf,

        /// Target profile (JSON)
        target: PathBuf,

        /// Degradation strategy configuration (TOML)
        #[arg(short = 'c', long = "config", value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output format (text or json)
        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,

        /// Also show unchanged and undetermined results
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },

    /// Fit regression models to every uid of a profile
    Fit {
        /// Profile to postprocess (JSON)
        profile: PathBuf,

        /// Write the profile with fitted models here instead of stdout
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },
}
