//! Core configuration types
//!
//! This module defines the data structures that represent a tash.yml configuration file.

use crate::runner::Condition;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Configuration {
    /// Block pattern of files to import, relative to this file's directory
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub imports: String,

    /// Global environment, evaluated in order before any task runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<EnvAction>,

    /// Named action lists that tasks can reference
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub templates: IndexMap<String, Vec<Action>>,

    /// Tasks defined in the configuration
    #[serde(default)]
    pub tasks: IndexMap<String, Task>,
}

/// Bind one variable, or a block of `key=value` pairs when `name` is empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnvAction {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, deserialize_with = "deserialize_scalar")]
    pub value: String,
}

/// A task definition
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Task {
    /// Description for help text
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Default command directory; the current directory when empty
    #[serde(default, alias = "workDir", skip_serializing_if = "String::is_empty")]
    pub workdir: String,

    /// Arguments, exposed as environment variables and `--<env>` options
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<TaskArgument>,

    /// Actions to execute
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// A task argument
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaskArgument {
    /// Variable the value is bound to
    pub env: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(
        default,
        deserialize_with = "deserialize_scalar",
        skip_serializing_if = "String::is_empty"
    )]
    pub default: String,
}

/// One step of a task or template
///
/// Exactly one kind should be set; `then` and `else` belong to `if`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Action {
    #[serde(
        default,
        deserialize_with = "deserialize_env",
        skip_serializing_if = "Option::is_none"
    )]
    pub env: Option<EnvAction>,

    #[serde(
        default,
        deserialize_with = "deserialize_cmd",
        skip_serializing_if = "Option::is_none"
    )]
    pub cmd: Option<CmdAction>,

    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub then: Vec<Action>,

    #[serde(rename = "else", default, skip_serializing_if = "Vec::is_empty")]
    pub otherwise: Vec<Action>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<CopyAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<HashAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<ReplaceAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<ListAction>,

    /// Run a template in a child scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Change the command directory for the rest of the action list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chdir: Option<String>,
}

/// The kind an action was written as
#[derive(Debug, Clone, Copy)]
pub enum ActionKind<'a> {
    Env(&'a EnvAction),
    Cmd(&'a CmdAction),
    If(&'a Condition),
    Copy(&'a CopyAction),
    Hash(&'a HashAction),
    Download(&'a DownloadAction),
    Replace(&'a ReplaceAction),
    List(&'a ListAction),
    Template(&'a str),
    Chdir(&'a str),
}

impl ActionKind<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Env(_) => "env",
            ActionKind::Cmd(_) => "cmd",
            ActionKind::If(_) => "if",
            ActionKind::Copy(_) => "copy",
            ActionKind::Hash(_) => "hash",
            ActionKind::Download(_) => "download",
            ActionKind::Replace(_) => "replace",
            ActionKind::List(_) => "list",
            ActionKind::Template(_) => "template",
            ActionKind::Chdir(_) => "chdir",
        }
    }
}

impl Action {
    /// Every kind set on this action, in declaration order
    pub fn kinds(&self) -> Vec<ActionKind<'_>> {
        let mut kinds = Vec::new();
        if let Some(env) = &self.env {
            kinds.push(ActionKind::Env(env));
        }
        if let Some(cmd) = &self.cmd {
            kinds.push(ActionKind::Cmd(cmd));
        }
        if let Some(cond) = &self.condition {
            kinds.push(ActionKind::If(cond));
        }
        if let Some(copy) = &self.copy {
            kinds.push(ActionKind::Copy(copy));
        }
        if let Some(hash) = &self.hash {
            kinds.push(ActionKind::Hash(hash));
        }
        if let Some(download) = &self.download {
            kinds.push(ActionKind::Download(download));
        }
        if let Some(replace) = &self.replace {
            kinds.push(ActionKind::Replace(replace));
        }
        if let Some(list) = &self.list {
            kinds.push(ActionKind::List(list));
        }
        if let Some(name) = &self.template {
            kinds.push(ActionKind::Template(name));
        }
        if let Some(dir) = &self.chdir {
            kinds.push(ActionKind::Chdir(dir));
        }
        kinds
    }

    /// The single kind of a well-formed action
    pub fn kind(&self) -> Option<ActionKind<'_>> {
        match self.kinds().as_slice() {
            [kind] => Some(*kind),
            _ => None,
        }
    }

    /// Templates referenced by this action and its branches
    pub fn template_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self.template.as_deref().into_iter().collect();
        for action in self.then.iter().chain(&self.otherwise) {
            refs.extend(action.template_refs());
        }
        refs
    }
}

/// Run a command line
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CmdAction {
    pub exec: String,

    /// Working directory, relative to the current command directory
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dir: String,

    /// Start without waiting; reaped when the task finishes
    #[serde(default)]
    pub background: bool,

    /// Capture trimmed stdout into `env`, or print it when `env` is empty
    #[serde(default)]
    pub capture: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub env: String,

    /// File to read stdin from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdin: String,

    /// File to write stdout to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,

    /// File to write stderr to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,

    /// Append to `stdout`/`stderr` files instead of truncating
    #[serde(default)]
    pub append: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CopyAction {
    /// Block pattern of sources
    pub src: String,
    pub dst: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HashAction {
    /// Block pattern of files that must all verify
    pub path: String,
    pub alg: String,

    #[serde(deserialize_with = "deserialize_scalar")]
    pub sig: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DownloadAction {
    pub url: String,
    pub dst: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alg: String,

    #[serde(
        default,
        deserialize_with = "deserialize_scalar",
        skip_serializing_if = "String::is_empty"
    )]
    pub sig: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReplaceAction {
    /// Block pattern of files to rewrite
    pub path: String,

    /// `find, replace, find, replace, ...`
    #[serde(default, deserialize_with = "deserialize_scalars")]
    pub pairs: Vec<String>,

    #[serde(default)]
    pub regexp: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListAction {
    pub pattern: String,

    #[serde(default, alias = "filesOnly")]
    pub files_only: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub env: String,

    /// Separator used when binding to `env`; a single space by default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sep: Option<String>,
}

/// Render a YAML scalar as the string it was written as
///
/// Unquoted numbers and booleans are accepted wherever a string is expected;
/// null becomes the empty string.
fn scalar_to_string<E: serde::de::Error>(value: serde_yaml::Value) -> Result<String, E> {
    use serde_yaml::Value;

    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Tagged(tagged) => scalar_to_string(tagged.value),
        _ => Err(E::custom("expected a string, number or boolean")),
    }
}

/// Deserialize any scalar into a `String`
pub fn deserialize_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    scalar_to_string(serde_yaml::Value::deserialize(deserializer)?)
}

/// Deserialize an optional scalar; null stays `None`
pub fn deserialize_opt_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(None),
        value => scalar_to_string(value).map(Some),
    }
}

/// Deserialize a list of scalars into strings
pub fn deserialize_scalars<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Vec::<serde_yaml::Value>::deserialize(deserializer)?
        .into_iter()
        .map(scalar_to_string)
        .collect()
}

/// Custom deserializer for `env`: a `key=value` block string or a mapping
fn deserialize_env<'de, D>(deserializer: D) -> Result<Option<EnvAction>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::String(s) => Ok(Some(EnvAction {
            name: String::new(),
            value: s,
        })),
        Value::Mapping(_) => EnvAction::deserialize(value)
            .map(Some)
            .map_err(D::Error::custom),
        Value::Null => Ok(None),
        _ => Err(D::Error::custom("env must be a string or object")),
    }
}

/// Custom deserializer for `cmd`: a bare command line or a mapping
fn deserialize_cmd<'de, D>(deserializer: D) -> Result<Option<CmdAction>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    let value = Value::deserialize(deserializer)?;

    match value {
        Value::String(exec) => Ok(Some(CmdAction {
            exec,
            ..CmdAction::default()
        })),
        Value::Mapping(_) => CmdAction::deserialize(value)
            .map(Some)
            .map_err(D::Error::custom),
        Value::Null => Ok(None),
        _ => Err(D::Error::custom("cmd must be a string or object")),
    }
}
