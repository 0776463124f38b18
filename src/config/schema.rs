//! Configuration validation
//!
//! This module provides validation logic for configuration files.

use crate::config::types::{Action, ActionKind, Configuration, Task};
use crate::error::{ConfigError, ConfigResult};
use crate::fileops::HashAlgorithm;
use std::collections::HashSet;

/// Validate a complete configuration
pub fn validate_config(config: &Configuration) -> ConfigResult<()> {
    for (name, actions) in &config.templates {
        validate_actions(config, &format!("template {}", name), actions)?;
    }

    for (name, task) in &config.tasks {
        validate_task(config, name, task)?;
    }

    detect_circular_templates(config)?;

    Ok(())
}

/// Validate a single task
pub fn validate_task(config: &Configuration, name: &str, task: &Task) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for arg in &task.args {
        let env = arg.env.trim();
        if env.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "task {}: argument without env name",
                name
            )));
        }
        if !seen.insert(env) {
            return Err(ConfigError::Duplicate(format!("task {} argument {}", name, env)));
        }
    }

    validate_actions(config, &format!("task {}", name), &task.actions)
}

fn validate_actions(config: &Configuration, location: &str, actions: &[Action]) -> ConfigResult<()> {
    for (i, action) in actions.iter().enumerate() {
        let location = format!("{} action {}", location, i + 1);
        validate_action(config, &location, action)?;
    }
    Ok(())
}

fn validate_action(config: &Configuration, location: &str, action: &Action) -> ConfigResult<()> {
    let kinds = action.kinds();
    let kind = match kinds.as_slice() {
        [kind] => *kind,
        [] => {
            return Err(ConfigError::Invalid(format!("{}: no action kind set", location)));
        }
        many => {
            let names: Vec<_> = many.iter().map(|k| k.name()).collect();
            return Err(ConfigError::Invalid(format!(
                "{}: only one action kind allowed, found {}",
                location,
                names.join(", ")
            )));
        }
    };

    if !matches!(kind, ActionKind::If(_)) && (!action.then.is_empty() || !action.otherwise.is_empty()) {
        return Err(ConfigError::Invalid(format!(
            "{}: then/else are only allowed with if",
            location
        )));
    }

    match kind {
        ActionKind::If(_) => {
            validate_actions(config, &format!("{} then", location), &action.then)?;
            validate_actions(config, &format!("{} else", location), &action.otherwise)?;
        }
        ActionKind::Cmd(cmd) => {
            if cmd.exec.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{}: empty command", location)));
            }
            if cmd.capture && cmd.background {
                return Err(ConfigError::Invalid(format!(
                    "{}: capture and background are exclusive",
                    location
                )));
            }
        }
        ActionKind::Template(name) => {
            if !config.templates.contains_key(name) {
                return Err(ConfigError::TemplateNotFound(name.to_string()));
            }
        }
        ActionKind::Hash(hash) => validate_hash(location, &hash.alg, &hash.sig)?,
        ActionKind::Download(download) => {
            if download.alg.is_empty() != download.sig.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{}: download needs both alg and sig, or neither",
                    location
                )));
            }
            if !download.alg.is_empty() {
                validate_hash(location, &download.alg, &download.sig)?;
            }
        }
        ActionKind::Replace(replace) => {
            if replace.pairs.len() % 2 != 0 {
                return Err(ConfigError::Invalid(format!(
                    "{}: replace pairs must come in find/replace pairs",
                    location
                )));
            }
        }
        ActionKind::Env(_) | ActionKind::Copy(_) | ActionKind::List(_) | ActionKind::Chdir(_) => {}
    }
    Ok(())
}

fn validate_hash(location: &str, alg: &str, sig: &str) -> ConfigResult<()> {
    // a variable reference is only known once expanded at run time
    if !alg.contains('$') {
        alg.parse::<HashAlgorithm>()
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", location, e)))?;
    }
    if sig.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{}: empty hash signature", location)));
    }
    Ok(())
}

/// Detect templates that reference themselves, directly or not
fn detect_circular_templates(config: &Configuration) -> ConfigResult<()> {
    let mut visited = HashSet::new();
    for name in config.templates.keys() {
        let mut stack = Vec::new();
        check_template_cycle(config, name, &mut visited, &mut stack)?;
    }
    Ok(())
}

fn check_template_cycle<'c>(
    config: &'c Configuration,
    name: &'c str,
    visited: &mut HashSet<&'c str>,
    stack: &mut Vec<&'c str>,
) -> ConfigResult<()> {
    if stack.contains(&name) {
        stack.push(name);
        return Err(ConfigError::CircularTemplate(stack.join(" -> ")));
    }

    if visited.contains(name) {
        return Ok(());
    }

    let actions = config
        .templates
        .get(name)
        .ok_or_else(|| ConfigError::TemplateNotFound(name.to_string()))?;

    stack.push(name);
    for action in actions {
        for reference in action.template_refs() {
            check_template_cycle(config, reference, visited, stack)?;
        }
    }
    stack.pop();
    visited.insert(name);

    Ok(())
}
