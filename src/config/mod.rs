//! Configuration parsing and validation
//!
//! This module handles parsing of tash.yml configuration files, their
//! imports, and validation of configuration structure.

pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use schema::*;
pub use types::*;
