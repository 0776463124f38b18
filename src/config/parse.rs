//! Configuration file parsing, discovery and imports

use crate::config::types::{Configuration, EnvAction};
use crate::error::{ConfigError, ConfigResult, TashError};
use crate::fileops::glob_expand_in;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["tash.yaml", "tash.yml"];

/// Find the configuration file by searching current and parent directories
pub fn find_config_file() -> ConfigResult<PathBuf> {
    find_config_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the configuration file starting from a specific directory
pub fn find_config_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in CONFIG_FILE_NAMES {
            let config_path = current_dir.join(file_name);
            searched_paths.push(config_path.display().to_string());

            if config_path.is_file() {
                return Ok(config_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a configuration file from a path, resolving its imports
pub fn parse_config_file(path: &Path) -> Result<Configuration, TashError> {
    let mut seen = HashSet::new();
    load_file(path, &mut seen)
}

/// Parse configuration from a string
///
/// Imports are resolved relative to `config_path`'s directory when it is
/// given, and ignored otherwise.
pub fn parse_config(yaml: &str, config_path: Option<&Path>) -> Result<Configuration, TashError> {
    let mut config: Configuration = serde_yaml::from_str(yaml)?;

    if let Some(path) = config_path {
        let mut seen = HashSet::new();
        seen.insert(canonical(path));
        process_imports(&mut config, path, &mut seen)?;
    }

    Ok(config)
}

/// Parse configuration with automatic file discovery
pub fn parse_config_auto() -> Result<(Configuration, PathBuf), TashError> {
    let config_path = find_config_file()?;
    let config = parse_config_file(&config_path)?;
    Ok((config, config_path))
}

fn load_file(path: &Path, seen: &mut HashSet<PathBuf>) -> Result<Configuration, TashError> {
    seen.insert(canonical(path));
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Import {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    let mut config: Configuration = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Import {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    process_imports(&mut config, path, seen)?;
    Ok(config)
}

/// Merge every imported file into `config`
///
/// Imported envs come before the importing file's own, so the importer can
/// override them. Files already loaded are skipped.
fn process_imports(
    config: &mut Configuration,
    config_path: &Path,
    seen: &mut HashSet<PathBuf>,
) -> Result<(), TashError> {
    if config.imports.trim().is_empty() {
        return Ok(());
    }
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
    let matches = glob_expand_in(base_dir, &config.imports, true).map_err(|e| ConfigError::Import {
        path: config_path.to_path_buf(),
        error: e.to_string(),
    })?;

    let mut imported_envs = Vec::new();
    for rel in matches {
        let path = if base_dir.as_os_str().is_empty() {
            PathBuf::from(&rel)
        } else {
            base_dir.join(&rel)
        };
        if seen.contains(&canonical(&path)) {
            tracing::debug!(path = %path.display(), "skipping already imported file");
            continue;
        }
        tracing::debug!(path = %path.display(), "importing");

        if is_dotenv(&path) {
            seen.insert(canonical(&path));
            imported_envs.extend(load_dotenv(&path)?);
            continue;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                let imported = load_file(&path, seen)?;
                imported_envs.extend(imported.envs);
                for (name, actions) in imported.templates {
                    if config.templates.contains_key(&name) {
                        return Err(ConfigError::Duplicate(format!("template {}", name)).into());
                    }
                    config.templates.insert(name, actions);
                }
                for (name, task) in imported.tasks {
                    if config.tasks.contains_key(&name) {
                        return Err(ConfigError::Duplicate(format!("task {}", name)).into());
                    }
                    config.tasks.insert(name, task);
                }
            }
            _ => {
                return Err(ConfigError::Import {
                    path,
                    error: "unsupported file type".to_string(),
                }
                .into())
            }
        }
    }

    imported_envs.append(&mut config.envs);
    config.envs = imported_envs;
    Ok(())
}

fn is_dotenv(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == ".env" || n.ends_with(".env"))
}

/// Read a `.env` file into named env actions
///
/// Values are taken literally; `$` is escaped so they are not expanded again.
fn load_dotenv(path: &Path) -> ConfigResult<Vec<EnvAction>> {
    let to_import_error = |e: dotenvy::Error| ConfigError::Import {
        path: path.to_path_buf(),
        error: e.to_string(),
    };
    let iter = dotenvy::from_path_iter(path).map_err(to_import_error)?;
    let mut envs = Vec::new();
    for item in iter {
        let (name, value) = item.map_err(to_import_error)?;
        envs.push(EnvAction {
            name,
            value: value.replace('$', "$$"),
        });
    }
    Ok(envs)
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
