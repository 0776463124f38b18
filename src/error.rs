//! Error types for Tash

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Tash operations
pub type Result<T> = std::result::Result<T, TashError>;

/// Main error type for Tash
#[derive(Error, Debug)]
pub enum TashError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Template '{0}' is not defined")]
    TemplateNotFound(String),

    #[error("'{0}' is defined more than once")]
    Duplicate(String),

    #[error("Circular template reference detected: {0}")]
    CircularTemplate(String),

    #[error("Failed to import file '{path}': {error}")]
    Import { path: PathBuf, error: String },
}

/// Command line tokenizing and pipeline execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("empty command line string")]
    EmptyCommandLine,

    #[error("parse command string failed: {reason}: {input}")]
    Parse { input: String, reason: String },

    #[error("command substitution failed: {command}: {source}")]
    Substitution {
        command: String,
        #[source]
        source: Box<CommandError>,
    },

    #[error("start command '{program}' failed: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("command '{program}' exited with {status}")]
    Exit { program: String, status: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

/// Condition evaluation errors
#[derive(Error, Debug)]
pub enum ConditionError {
    #[error("invalid condition operator: {0}")]
    UnknownOperator(String),

    #[error("operator doesn't need compare field: {0}")]
    UnexpectedCompare(String),

    #[error("operator requires compare field: {0}")]
    MissingCompare(String),

    #[error("invalid integer value: '{0}'")]
    InvalidInteger(String),

    #[error("invalid boolean value: '{0}'")]
    InvalidBool(String),

    #[error("compile regexp failed: {pattern}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("access file failed: {path}: {source}")]
    FileAccess {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("lookup executable binary failed: {name}: {source}")]
    BinaryLookup {
        name: String,
        #[source]
        source: which::Error,
    },
}

/// File operation errors (copy, hash, download, replace, glob)
#[derive(Error, Debug)]
pub enum FileOpError {
    #[error("unsupported hash algorithm: '{0}'")]
    UnsupportedHash(String),

    #[error("empty hash signature: {0}")]
    EmptySignature(String),

    #[error("failed to fetch resource: {status}")]
    HttpStatus { status: String },

    #[error("create download request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("replace arguments must come in pairs, got {0}")]
    OddReplaceArgs(usize),

    #[error("compile regexp failed: {pattern}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("glob path failed: {pattern}: {reason}")]
    Glob { pattern: String, reason: String },

    #[error("{context}: {path}: {source}")]
    Io {
        context: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileOpError {
    /// Wrap an I/O error with an operation prefix and the path involved
    pub fn io(context: &str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        FileOpError::Io {
            context: context.to_string(),
            path: path.into(),
            source,
        }
    }
}

/// Task execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error(transparent)]
    FileOp(#[from] FileOpError),

    #[error("hash mismatch: {0}")]
    HashMismatch(String),

    #[error("no file matched: {0}")]
    NoMatch(String),

    #[error("Task '{0}' is not defined")]
    TaskNotFound(String),

    #[error("Template '{0}' is not defined")]
    TemplateNotFound(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for command operations
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Specialized result type for condition evaluation
pub type ConditionResult<T> = std::result::Result<T, ConditionError>;

/// Specialized result type for file operations
pub type FileOpResult<T> = std::result::Result<T, FileOpError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Render `err` followed by every cause not already in its message
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
