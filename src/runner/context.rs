//! Scoped environment for action execution
//!
//! An [`EnvContext`] holds the variable bindings of one scope and a reference
//! to its parent. Lookups walk the chain, nearest scope first. A child only
//! ever writes its own bindings, so nothing set inside a nested action or
//! template leaks back into the caller.

use crate::error::CommandResult;
use crate::runner::{argv, interpolate};
use crate::utils::{split_blocks, split_pair, unquote};
use indexmap::IndexMap;
use std::env;

/// Variable scope with an optional immutable parent
#[derive(Debug, Default)]
pub struct EnvContext<'p> {
    parent: Option<&'p EnvContext<'p>>,
    vars: IndexMap<String, String>,
}

impl EnvContext<'static> {
    /// Create an empty root scope
    pub fn new() -> Self {
        EnvContext {
            parent: None,
            vars: IndexMap::new(),
        }
    }

    /// Create a root scope seeded from the process environment
    pub fn from_process() -> Self {
        let vars = env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        EnvContext { parent: None, vars }
    }
}

impl<'p> EnvContext<'p> {
    /// Create a child scope that shadows this one
    pub fn child(&self) -> EnvContext<'_> {
        EnvContext {
            parent: Some(self),
            vars: IndexMap::new(),
        }
    }

    /// Set variables in this scope
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.vars.insert(k.into(), v.into());
        }
        self
    }

    /// Bind a variable in this scope
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Resolve a variable through the scope chain
    pub fn get(&self, name: &str) -> Option<&str> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if let Some(v) = s.vars.get(name) {
                return Some(v.as_str());
            }
            scope = s.parent;
        }
        None
    }

    /// True if `name` is bound in this scope or any ancestor
    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bindings defined directly in this scope
    pub fn local_vars(&self) -> &IndexMap<String, String> {
        &self.vars
    }

    /// Expand every variable reference in `s`
    pub fn expand(&self, s: &str) -> String {
        interpolate(s, |name| self.get(name).map(str::to_string))
    }

    /// Apply an environment action
    ///
    /// With a name, the expanded value is bound to it. Without one, the value
    /// is a block of `key=value` pairs separated by newlines or semicolons;
    /// values may be quoted, and each pair sees the ones before it.
    pub fn apply_env(&mut self, name: &str, value: &str) {
        let name = name.trim();
        if !name.is_empty() {
            let expanded = self.expand(value);
            self.set(name, expanded);
            return;
        }
        for entry in split_blocks(value) {
            let (key, raw) = split_pair(&entry, '=');
            if key.is_empty() {
                tracing::warn!(entry = %entry, "ignoring environment entry without a name");
                continue;
            }
            let expanded = if raw.starts_with('\'') && unquote(&raw).len() != raw.len() {
                unquote(&raw).to_string()
            } else {
                self.expand(unquote(&raw))
            };
            self.set(key, expanded);
        }
    }

    /// Flatten the chain into one ordered map, nearest scope winning
    pub fn bindings(&self) -> IndexMap<String, String> {
        let mut chain = Vec::new();
        let mut scope = Some(self);
        while let Some(s) = scope {
            chain.push(s);
            scope = s.parent;
        }
        let mut merged = IndexMap::new();
        for s in chain.into_iter().rev() {
            for (k, v) in &s.vars {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }

    /// Produce `KEY=VALUE` pairs for a child process
    ///
    /// Inherited process variables come first and are overridden by any
    /// binding in the chain with the same name.
    pub fn materialize(&self) -> Vec<String> {
        let mut merged: IndexMap<String, String> = env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        for (k, v) in self.bindings() {
            merged.insert(k, v);
        }
        merged
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }

    /// Tokenize a command line into pipeline stages
    ///
    /// Variable references are expanded in this scope; `$(...)` and backquoted
    /// sub-commands are handed to `substitute`, which returns their output.
    pub fn expand_command(
        &self,
        cmd: &str,
        substitute: &mut dyn FnMut(&str) -> CommandResult<String>,
    ) -> CommandResult<Vec<Vec<String>>> {
        argv::tokenize(cmd, &|reference| self.expand(reference), substitute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_new_is_empty() {
        let ctx = EnvContext::new();
        assert!(ctx.local_vars().is_empty());
        assert!(!ctx.exists("anything"));
    }

    #[test]
    fn test_child_shadows_parent() {
        let root = EnvContext::new().with_vars([("a", "1"), ("b", "2")]);
        let mut child = root.child();
        child.set("a", "override");

        assert_eq!(child.get("a"), Some("override"));
        assert_eq!(child.get("b"), Some("2"));
        assert_eq!(root.get("a"), Some("1"));
    }

    #[test]
    fn test_child_mutations_do_not_escape() {
        let root = EnvContext::new();
        {
            let mut child = root.child();
            child.set("only_here", "x");
            assert!(child.exists("only_here"));
        }
        assert!(!root.exists("only_here"));
    }

    #[test]
    fn test_exists_walks_ancestors() {
        let root = EnvContext::new().with_vars([("top", "")]);
        let mid = root.child();
        let leaf = mid.child();
        assert!(leaf.exists("top"));
        assert!(!leaf.exists("missing"));
    }

    #[test]
    fn test_expand_uses_chain() {
        let root = EnvContext::new().with_vars([("name", "world")]);
        let mut child = root.child();
        child.set("greet", "hello");
        assert_eq!(child.expand("${greet|upper}, $name"), "HELLO, world");
        assert_eq!(child.expand("${nope}"), "");
    }

    #[test]
    fn test_apply_env_named() {
        let mut ctx = EnvContext::new().with_vars([("base", "/opt")]);
        ctx.apply_env("BIN", "${base}/bin");
        assert_eq!(ctx.get("BIN"), Some("/opt/bin"));
    }

    #[test]
    fn test_apply_env_block() {
        let mut ctx = EnvContext::new();
        ctx.apply_env(
            "",
            "A=1; B=\"two words\"\nC=${A}-${B}\n  ;D='$A'",
        );
        assert_eq!(ctx.get("A"), Some("1"));
        assert_eq!(ctx.get("B"), Some("two words"));
        assert_eq!(ctx.get("C"), Some("1-two words"));
        assert_eq!(ctx.get("D"), Some("$A"));
    }

    #[test]
    fn test_bindings_nearest_wins() {
        let root = EnvContext::new().with_vars([("k", "root"), ("r", "1")]);
        let mut child = root.child();
        child.set("k", "child");
        let flat = child.bindings();
        assert_eq!(flat.get("k").map(String::as_str), Some("child"));
        assert_eq!(flat.get("r").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_materialize_overrides_process_env() {
        let ctx = EnvContext::new().with_vars([("PATH", "/custom/bin"), ("TASH_ONLY", "yes")]);
        let list = ctx.materialize();

        assert!(list.contains(&"PATH=/custom/bin".to_string()));
        assert!(list.contains(&"TASH_ONLY=yes".to_string()));
        assert_eq!(list.iter().filter(|kv| kv.starts_with("PATH=")).count(), 1);

        let mut keys: Vec<&str> = list.iter().filter_map(|kv| kv.split_once('=')).map(|(k, _)| k).collect();
        let total = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn test_expand_command_with_stub_substitution() {
        let ctx = EnvContext::new().with_vars([("who", "there")]);
        let mut calls = Vec::new();
        let stages = ctx
            .expand_command("echo hi $who $(whoami) | wc -c", &mut |sub| {
                calls.push(sub.to_string());
                Ok("me".to_string())
            })
            .unwrap();

        assert_eq!(calls, vec!["whoami"]);
        assert_eq!(
            stages,
            vec![
                vec!["echo", "hi", "there", "me"],
                vec!["wc", "-c"],
            ]
        );
    }
}
