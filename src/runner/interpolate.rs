//! Variable interpolation for strings
//!
//! This module handles parsing and replacing variable references:
//!
//! - `$NAME` and `${NAME}` - variable from the lookup
//! - `${NAME|filter|filter:arg}` - value passed through filters, left to right
//! - `$$` - a literal `$`
//!
//! Undefined variables expand to the empty string. Expansion never fails.

use crate::utils::to_slash;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::Path;

/// Matches `$$`, `${...}` and `$NAME`
static VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\$|\$\{([^}]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").expect("variable pattern is valid")
});

/// Interpolate every variable reference in `s`
pub fn interpolate<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if !s.contains('$') {
        return s.to_string();
    }
    VAR_RE
        .replace_all(s, |caps: &Captures| {
            if let Some(inner) = caps.get(1) {
                expand_reference(inner.as_str(), &lookup)
            } else if let Some(name) = caps.get(2) {
                lookup(name.as_str()).unwrap_or_default()
            } else {
                "$".to_string()
            }
        })
        .into_owned()
}

/// Expand the inside of a `${...}` reference
fn expand_reference<F>(inner: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut parts = inner.split('|');
    let name = parts.next().unwrap_or_default().trim();
    let mut value = if name.is_empty() {
        String::new()
    } else {
        lookup(name).unwrap_or_default()
    };
    for filter in parts {
        value = apply_filter(&value, filter.trim());
    }
    value
}

/// Apply one expansion filter to a value
pub fn apply_filter(value: &str, filter: &str) -> String {
    let (name, arg) = match filter.split_once(':') {
        Some((n, a)) => (n, Some(a)),
        None => (filter, None),
    };
    match (name, arg) {
        ("upper", None) => value.to_uppercase(),
        ("lower", None) => value.to_lowercase(),
        ("title", None) => title_case(value),
        ("trim", None) => value.trim().to_string(),
        ("default", Some(fallback)) => {
            if value.is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        }
        ("replace", Some(arg)) => match arg.split_once(':') {
            Some((old, new)) if !old.is_empty() => value.replace(old, new),
            _ => value.to_string(),
        },
        ("trimPrefix", Some(prefix)) => value.strip_prefix(prefix).unwrap_or(value).to_string(),
        ("trimSuffix", Some(suffix)) => value.strip_suffix(suffix).unwrap_or(value).to_string(),
        ("slash", None) => to_slash(value),
        ("base", None) => Path::new(value)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        ("dir", None) => match Path::new(value).parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
            _ => ".".to_string(),
        },
        ("ext", None) => Path::new(value)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
        _ => {
            tracing::warn!(filter, "unknown expansion filter, value left unchanged");
            value.to_string()
        }
    }
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}
