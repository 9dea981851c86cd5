use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::CollectionMode;

/// Command-line arguments for the binrepo-collector binary.
#[derive(Parser, Debug)]
#[clap(
    name = "binrepo-collector",
    about = "Binary-repository artifact metadata collector"
)]
pub struct Args {
    /// Path to the settings YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Override the configured collection mode
    #[clap(short, long)]
    pub mode: Option<ModeArg>,

    /// Write the cycle summary JSON to this path instead of stdout
    #[clap(short, long)]
    pub summary: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Collection mode selector for the command line.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum ModeArg {
    RepoBased,
    ArtifactBased,
    Hybrid,
}

impl From<ModeArg> for CollectionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::RepoBased => CollectionMode::RepoBased,
            ModeArg::ArtifactBased => CollectionMode::ArtifactBased,
            ModeArg::Hybrid => CollectionMode::Hybrid,
        }
    }
}

/// Available subcommands for the collector.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a default settings file
    InitConfig {
        /// Path to the output settings file
        #[clap(default_value = "config.yaml")]
        path: PathBuf,
    },
}
