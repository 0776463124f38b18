//! CLI interface and argument parsing
//!
//! This module builds the command line from the loaded configuration: one
//! subcommand per task, task arguments as long options, and shell
//! completion.

pub mod app;

// Re-export main types
pub use app::*;
