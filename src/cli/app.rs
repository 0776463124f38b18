//! Main CLI application

use crate::config::{parse_config_auto, parse_config_file, validate_config, Configuration};
use crate::error::{ConfigError, TashError};
use crate::runner::Runner;
use crate::ui::{Printer, Verbosity};
use clap::{Arg, ArgAction, ArgMatches, Command};
use clap_complete::{generate, Shell};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "TASH_LOG";

/// CLI application
pub struct App {
    /// The clap command
    command: Command,
    /// Parsed configuration
    config: Configuration,
    /// Config file path
    config_path: PathBuf,
}

impl App {
    /// Create a new app from the discovered configuration file
    pub fn new() -> Result<Self, TashError> {
        let (config, config_path) = parse_config_auto()?;
        Self::from_parts(config, config_path)
    }

    /// Create app with a specific config file
    pub fn with_config_file(path: PathBuf) -> Result<Self, TashError> {
        let config = parse_config_file(&path)?;
        Self::from_parts(config, path)
    }

    fn from_parts(config: Configuration, config_path: PathBuf) -> Result<Self, TashError> {
        validate_config(&config)?;
        let command = build_command(&config);
        Ok(App {
            command,
            config,
            config_path,
        })
    }

    /// Run the application with the process arguments
    pub fn run(self) -> Result<(), TashError> {
        self.run_from(std::env::args_os())
    }

    /// Run the application with explicit arguments
    pub fn run_from<I, T>(mut self, args: I) -> Result<(), TashError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().get_matches_from(args);

        let verbosity = get_verbosity(&matches);
        init_logging(verbosity);

        if let Some(shell) = matches.get_one::<Shell>("completions") {
            generate(*shell, &mut self.command, "tash", &mut io::stdout());
            return Ok(());
        }

        if matches.get_flag("list") {
            for line in task_list(&self.config) {
                println!("{}", line);
            }
            return Ok(());
        }

        let (task_name, task_matches) = match matches.subcommand() {
            Some((name, sub_matches)) => (name.to_string(), sub_matches),
            None => {
                self.command.print_help()?;
                println!();
                return Ok(());
            }
        };

        let args = parse_task_args(&self.config, &task_name, task_matches);
        let base_dir = self.config_path.parent().unwrap_or_else(|| Path::new(""));
        tracing::debug!(task = %task_name, config = %self.config_path.display(), "running task");

        let printer = Printer::new(verbosity);
        let mut runner = Runner::new(&self.config, base_dir, printer);
        let root = runner.root_context();
        runner.run_task(&root, &task_name, &args)?;

        Ok(())
    }
}

/// Build the clap command from configuration
fn build_command(config: &Configuration) -> Command {
    let mut cmd = Command::new("tash")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A YAML-based task runner that runs commands without a shell")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to tash.yml config file")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .help("List tasks")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .help("Print a shell completion script")
                .value_parser(clap::value_parser!(Shell)),
        );

    for (task_name, task) in &config.tasks {
        let mut task_cmd = Command::new(task_name.clone()).about(task.description.clone());

        for arg in &task.args {
            let mut help = arg.description.clone();
            if !arg.default.is_empty() {
                if !help.is_empty() {
                    help.push(' ');
                }
                help.push_str(&format!("[default: {}]", arg.default));
            }
            task_cmd = task_cmd.arg(
                Arg::new(arg.env.clone())
                    .long(arg.env.clone())
                    .value_name("VALUE")
                    .help(help),
            );
        }

        cmd = cmd.subcommand(task_cmd);
    }

    cmd
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Install the stderr log subscriber; `TASH_LOG` overrides the verbosity
fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));
    // a subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// `name  description` lines for every task
fn task_list(config: &Configuration) -> Vec<String> {
    let width = config.tasks.keys().map(String::len).max().unwrap_or(0);
    config
        .tasks
        .iter()
        .map(|(name, task)| {
            if task.description.is_empty() {
                name.clone()
            } else {
                format!("{:width$}  {}", name, task.description, width = width)
            }
        })
        .collect()
}

/// Argument values given on the command line for `task_name`
fn parse_task_args(config: &Configuration, task_name: &str, matches: &ArgMatches) -> HashMap<String, String> {
    let mut values = HashMap::new();
    if let Some(task) = config.tasks.get(task_name) {
        for arg in &task.args {
            if let Some(value) = matches.get_one::<String>(&arg.env) {
                values.insert(arg.env.clone(), value.clone());
            }
        }
    }
    values
}

/// Run the CLI application with the process arguments
pub fn run() -> Result<(), TashError> {
    let args: Vec<String> = std::env::args().collect();
    let file_path = extract_file_arg(&args);

    let app = match file_path {
        Some(path) => App::with_config_file(path)?,
        None => match App::new() {
            Ok(app) => app,
            // completions only need the global flags when no config is found
            Err(TashError::Config(ConfigError::NotFound(_))) if wants_completions(&args) => {
                App::from_parts(Configuration::default(), PathBuf::new())?
            }
            Err(e) => return Err(e),
        },
    };

    app.run()
}

/// Whether `--completions` was requested
fn wants_completions(args: &[String]) -> bool {
    args.iter()
        .any(|arg| arg == "--completions" || arg.starts_with("--completions="))
}

/// Extract --file argument before clap parsing
fn extract_file_arg(args: &[String]) -> Option<PathBuf> {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--file" || arg == "-f") && i + 1 < args.len() {
            return Some(PathBuf::from(&args[i + 1]));
        }
        if let Some(path) = arg.strip_prefix("--file=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}
