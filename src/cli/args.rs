//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, config::ConfigCommands, devices::DevicesCommands,
    import::ImportArgs, vehicles::VehiclesCommands,
};

#[derive(Parser)]
#[command(name = "fleet")]
#[command(author, version, about = "Fleet vehicle onboarding and inventory toolkit")]
#[command(
    long_about = "Import vehicle inventories from CSV, Excel, JSON, XML, or text files, \
                  and browse the resulting fleet and its tracking devices."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Directory holding the vehicle store (overrides config and FLEET_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import vehicles from a file (upload, map, preview, import)
    Import(ImportArgs),

    /// Browse the vehicle inventory
    #[command(subcommand)]
    Vehicles(VehiclesCommands),

    /// Tracking devices and positions
    #[command(subcommand)]
    Devices(DevicesCommands),

    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
}
