//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Paginated, link-following entity extraction
#[derive(Parser, Debug)]
#[command(name = "entity-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse an input with a definition
    Run {
        /// Parser definition file (YAML)
        #[arg(short, long)]
        definition: PathBuf,

        /// First page: a URL or a local path
        #[arg(short, long)]
        input: String,

        /// Directory for Parquet files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Validate a definition and print the resolved entity tree
    Validate {
        /// Parser definition file (YAML)
        #[arg(short, long)]
        definition: PathBuf,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON on one line
    Json,
    /// Indented JSON
    Pretty,
    /// One Parquet file per entity
    Parquet,
}
