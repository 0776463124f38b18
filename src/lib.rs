//! Tash - a YAML-based task runner that needs no shell
//!
//! Tasks are lists of actions: commands run as pipelines of processes with
//! their own tokenizer, conditions from a test(1)-like operator set, and
//! portable file operations (copy, hash, download, replace, glob).

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod fileops;
pub mod runner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use error::{Result, TashError};

/// Current version of Tash
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
