//! Common test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tash::config::{parse_config_file, validate_config, Configuration};
use tash::error::ExecutionResult;
use tash::runner::Runner;
use tash::ui::{Printer, Verbosity};
use tempfile::TempDir;

/// Create a temporary directory with a tash.yml file
pub fn create_test_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("tash.yml");
    fs::write(&config_path, content).unwrap();
    (temp_dir, config_path)
}

/// Write `content` to `dir/rel`, creating parent directories
pub fn write_file(dir: &Path, rel: &str, content: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Load and validate a config file
pub fn load(config_path: &Path) -> Configuration {
    let config = parse_config_file(config_path).unwrap();
    validate_config(&config).unwrap();
    config
}

/// Run `task` from the config at `config_path` without printing progress
///
/// The root scope is the process environment plus the config's `envs`.
pub fn run_task(config_path: &Path, task: &str, args: &[(&str, &str)]) -> ExecutionResult<()> {
    let config = load(config_path);
    let base_dir = config_path.parent().unwrap().to_path_buf();
    let mut runner = Runner::new(&config, base_dir, Printer::new(Verbosity::Silent));
    let root = runner.root_context();
    let args: HashMap<String, String> = args
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    runner.run_task(&root, task, &args)
}
