//! Task execution engine
//!
//! This module holds the runtime primitives actions are built on: scoped
//! variables, the command tokenizer and pipeline executor, the condition
//! evaluator, and the task runner that dispatches actions to them.

pub mod argv;
pub mod command;
pub mod condition;
pub mod context;
pub mod interpolate;
pub mod task;

// Re-export main types
pub use command::*;
pub use condition::*;
pub use context::*;
pub use interpolate::*;
pub use task::*;
