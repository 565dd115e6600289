//! CLI module
//!
//! Command-line interface for running parser definitions.
//!
//! # Commands
//!
//! - `run` - Parse an input and print JSON or write Parquet files
//! - `validate` - Check a definition and print its entity tree

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
