//! User-facing output
//!
//! Progress lines go to stderr, gated by the selected verbosity.

use colored::Colorize;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    #[default]
    Normal = 2,
    Verbose = 3,
}

impl Verbosity {
    /// Default `tracing` filter directive for this verbosity
    pub fn log_directive(self) -> &'static str {
        match self {
            Verbosity::Silent => "off",
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "debug",
        }
    }
}

/// Verbosity-gated printer
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    pub verbosity: Verbosity,
}

impl Printer {
    pub fn new(verbosity: Verbosity) -> Self {
        Printer { verbosity }
    }

    /// Print task start message
    pub fn task(&self, name: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} {}", "[TASK]".green().bold(), name);
        }
    }

    /// Print the command about to run
    pub fn command(&self, exec: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} {}", "[RUN]".cyan(), exec);
        }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity >= Verbosity::Normal {
            eprintln!("{} {}", "[INFO]".blue(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        if self.verbosity >= Verbosity::Quiet {
            eprintln!("{} {}", "[ERROR]".red().bold(), message);
        }
    }

    /// Print debug message (only in verbose mode)
    pub fn debug(&self, message: &str) {
        if self.verbosity >= Verbosity::Verbose {
            eprintln!("{} {}", "[DEBUG]".dimmed(), message);
        }
    }

    /// Print captured or listed output to stdout
    pub fn output(&self, text: &str) {
        if self.verbosity > Verbosity::Silent {
            println!("{}", text);
        }
    }
}
