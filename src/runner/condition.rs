//! Condition evaluation
//!
//! Conditions are `(value, operator, compare)` triples. Operators are looked
//! up by canonical name or alias in a table built once, then evaluated by the
//! function for their family: string, number, boolean, file or environment.

use crate::config::types::{deserialize_opt_scalar, deserialize_scalar};
use crate::error::{ConditionError, ConditionResult};
use crate::runner::EnvContext;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Comparison shared by the string and number families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Compare {
    fn apply<T: PartialOrd + ?Sized>(self, a: &T, b: &T) -> bool {
        match self {
            Compare::Equal => a == b,
            Compare::NotEqual => a != b,
            Compare::LessThan => a < b,
            Compare::LessThanOrEqual => a <= b,
            Compare::GreaterThan => a > b,
            Compare::GreaterThanOrEqual => a >= b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    Compare(Compare),
    Regexp,
    Empty,
    NotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    True,
    Not,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Exist,
    Dir,
    Regular,
    Symlink,
    Socket,
    NamedPipe,
    BlockDevice,
    CharDevice,
    Setuid,
    Setgid,
    Sticky,
    NotEmpty,
    NewerThan,
    OlderThan,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvOp {
    Defined,
}

/// A resolved condition operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    String(StringOp),
    Number(Compare),
    Bool(BoolOp),
    File(FileOp),
    Env(EnvOp),
}

impl Operator {
    /// True if the operator needs a compare field
    pub fn is_binary(self) -> bool {
        match self {
            Operator::String(op) => !matches!(op, StringOp::Empty | StringOp::NotEmpty),
            Operator::Number(_) => true,
            Operator::Bool(op) => matches!(op, BoolOp::And | BoolOp::Or),
            Operator::File(op) => matches!(op, FileOp::NewerThan | FileOp::OlderThan),
            Operator::Env(_) => false,
        }
    }

    /// Resolve an operator name or alias
    pub fn lookup(name: &str) -> ConditionResult<Operator> {
        OPERATORS
            .get(name)
            .copied()
            .ok_or_else(|| ConditionError::UnknownOperator(name.to_string()))
    }
}

const CANONICAL: &[(&str, Operator)] = &[
    ("string_equal", Operator::String(StringOp::Compare(Compare::Equal))),
    ("string_notEqual", Operator::String(StringOp::Compare(Compare::NotEqual))),
    ("string_lessThan", Operator::String(StringOp::Compare(Compare::LessThan))),
    ("string_lessThanOrEqual", Operator::String(StringOp::Compare(Compare::LessThanOrEqual))),
    ("string_greaterThan", Operator::String(StringOp::Compare(Compare::GreaterThan))),
    ("string_greaterThanOrEqual", Operator::String(StringOp::Compare(Compare::GreaterThanOrEqual))),
    ("string_regexp", Operator::String(StringOp::Regexp)),
    ("string_empty", Operator::String(StringOp::Empty)),
    ("string_notEmpty", Operator::String(StringOp::NotEmpty)),
    ("number_equal", Operator::Number(Compare::Equal)),
    ("number_notEqual", Operator::Number(Compare::NotEqual)),
    ("number_lessThan", Operator::Number(Compare::LessThan)),
    ("number_lessThanOrEqual", Operator::Number(Compare::LessThanOrEqual)),
    ("number_greaterThan", Operator::Number(Compare::GreaterThan)),
    ("number_greaterThanOrEqual", Operator::Number(Compare::GreaterThanOrEqual)),
    ("bool_true", Operator::Bool(BoolOp::True)),
    ("bool_not", Operator::Bool(BoolOp::Not)),
    ("bool_and", Operator::Bool(BoolOp::And)),
    ("bool_or", Operator::Bool(BoolOp::Or)),
    ("file_exist", Operator::File(FileOp::Exist)),
    ("file_dir", Operator::File(FileOp::Dir)),
    ("file_regular", Operator::File(FileOp::Regular)),
    ("file_symlink", Operator::File(FileOp::Symlink)),
    ("file_socket", Operator::File(FileOp::Socket)),
    ("file_namedPipe", Operator::File(FileOp::NamedPipe)),
    ("file_blockDevice", Operator::File(FileOp::BlockDevice)),
    ("file_charDevice", Operator::File(FileOp::CharDevice)),
    ("file_setuid", Operator::File(FileOp::Setuid)),
    ("file_setgid", Operator::File(FileOp::Setgid)),
    ("file_sticky", Operator::File(FileOp::Sticky)),
    ("file_notEmpty", Operator::File(FileOp::NotEmpty)),
    ("file_newerThan", Operator::File(FileOp::NewerThan)),
    ("file_olderThan", Operator::File(FileOp::OlderThan)),
    ("file_binary", Operator::File(FileOp::Binary)),
    ("env_defined", Operator::Env(EnvOp::Defined)),
];

/// Symbolic shorthands, mostly borrowed from `test(1)`
const ALIASES: &[(&str, &str)] = &[
    ("==", "string_equal"),
    ("=", "string_equal"),
    ("!=", "string_notEqual"),
    ("<", "string_lessThan"),
    ("<=", "string_lessThanOrEqual"),
    (">", "string_greaterThan"),
    (">=", "string_greaterThanOrEqual"),
    ("=~", "string_regexp"),
    ("-z", "string_empty"),
    ("-n", "string_notEmpty"),
    ("-eq", "number_equal"),
    ("-ne", "number_notEqual"),
    ("-lt", "number_lessThan"),
    ("-le", "number_lessThanOrEqual"),
    ("-gt", "number_greaterThan"),
    ("-ge", "number_greaterThanOrEqual"),
    ("!", "bool_not"),
    ("&&", "bool_and"),
    ("||", "bool_or"),
    ("-e", "file_exist"),
    ("-d", "file_dir"),
    ("-f", "file_regular"),
    ("-h", "file_symlink"),
    ("-L", "file_symlink"),
    ("-S", "file_socket"),
    ("-p", "file_namedPipe"),
    ("-b", "file_blockDevice"),
    ("-c", "file_charDevice"),
    ("-u", "file_setuid"),
    ("-g", "file_setgid"),
    ("-k", "file_sticky"),
    ("-s", "file_notEmpty"),
    ("-nt", "file_newerThan"),
    ("-ot", "file_olderThan"),
    ("-v", "env_defined"),
];

static OPERATORS: Lazy<HashMap<&'static str, Operator>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Operator> = CANONICAL.iter().copied().collect();
    for (alias, canonical) in ALIASES {
        if let Some(op) = table.get(canonical).copied() {
            table.insert(*alias, op);
        }
    }
    table
});

/// Integer prefixes, checked in order
const INT_PREFIXES: &[(&str, u32)] = &[("0x", 16), ("0o", 8), ("0b", 2)];

/// Parse an integer with an optional `0x`, `0o` or `0b` prefix
pub fn parse_int(s: &str) -> ConditionResult<i64> {
    let invalid = || ConditionError::InvalidInteger(s.to_string());
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, digits) = INT_PREFIXES
        .iter()
        .find_map(|(prefix, radix)| digits.strip_prefix(*prefix).map(|d| (*radix, d)))
        .unwrap_or((10, digits));
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(invalid());
    }
    // keep the sign on the digits so i64::MIN still parses
    let signed = if negative {
        format!("-{}", digits)
    } else {
        digits.to_string()
    };
    i64::from_str_radix(&signed, radix).map_err(|_| invalid())
}

/// Parse a boolean leniently; the empty string is false
pub fn parse_bool(s: &str) -> ConditionResult<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "" | "false" | "no" | "0" => Ok(false),
        _ => Err(ConditionError::InvalidBool(s.to_string())),
    }
}

/// A condition as written in a task file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Condition {
    #[serde(default, deserialize_with = "deserialize_scalar")]
    pub value: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operator: String,

    #[serde(
        default,
        deserialize_with = "deserialize_opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub compare: Option<String>,
}

impl Condition {
    /// Evaluate with `value` and `compare` expanded in `ctx` first
    pub fn evaluate(&self, ctx: &EnvContext<'_>) -> ConditionResult<bool> {
        let value = ctx.expand(&self.value);
        let compare = self.compare.as_deref().map(|c| ctx.expand(c));
        check_condition(ctx, &value, &self.operator, compare.as_deref())
    }
}

/// Evaluate one condition
///
/// With no operator, `bool_true` is used when there is no compare field and
/// `string_equal` when there is one.
pub fn check_condition(
    ctx: &EnvContext<'_>,
    value: &str,
    operator: &str,
    compare: Option<&str>,
) -> ConditionResult<bool> {
    let name = match (operator.trim(), compare) {
        ("", None) => "bool_true",
        ("", Some(_)) => "string_equal",
        (name, _) => name,
    };
    let op = Operator::lookup(name)?;

    let compare = match (op.is_binary(), compare) {
        (true, Some(c)) => c,
        (true, None) => return Err(ConditionError::MissingCompare(name.to_string())),
        (false, None) => "",
        (false, Some(_)) => return Err(ConditionError::UnexpectedCompare(name.to_string())),
    };

    match op {
        Operator::String(op) => check_string(op, value, compare),
        Operator::Number(cmp) => check_number(cmp, value, compare),
        Operator::Bool(op) => check_bool(op, value, compare),
        Operator::File(op) => check_file(op, value, compare),
        Operator::Env(EnvOp::Defined) => Ok(ctx.exists(value)),
    }
}

fn check_string(op: StringOp, value: &str, compare: &str) -> ConditionResult<bool> {
    Ok(match op {
        StringOp::Compare(cmp) => cmp.apply(value, compare),
        StringOp::Regexp => {
            let re = Regex::new(compare).map_err(|source| ConditionError::InvalidRegex {
                pattern: compare.to_string(),
                source,
            })?;
            re.is_match(value)
        }
        StringOp::Empty => value.is_empty(),
        StringOp::NotEmpty => !value.is_empty(),
    })
}

fn check_number(cmp: Compare, value: &str, compare: &str) -> ConditionResult<bool> {
    let a = parse_operand(value)?;
    let b = parse_operand(compare)?;
    Ok(cmp.apply(&a, &b))
}

/// An empty operand, such as an unset variable, counts as zero
fn parse_operand(s: &str) -> ConditionResult<i64> {
    if s.is_empty() {
        Ok(0)
    } else {
        parse_int(s)
    }
}

fn check_bool(op: BoolOp, value: &str, compare: &str) -> ConditionResult<bool> {
    let a = parse_bool(value)?;
    Ok(match op {
        BoolOp::True => a,
        BoolOp::Not => !a,
        BoolOp::And => {
            let b = parse_bool(compare)?;
            a && b
        }
        BoolOp::Or => {
            let b = parse_bool(compare)?;
            a || b
        }
    })
}

fn check_file(op: FileOp, value: &str, compare: &str) -> ConditionResult<bool> {
    let path = Path::new(value);
    let stat = || fs::metadata(path).ok();
    Ok(match op {
        FileOp::Exist => stat().is_some(),
        FileOp::Dir => stat().is_some_and(|m| m.is_dir()),
        FileOp::Regular => stat().is_some_and(|m| m.is_file()),
        FileOp::Symlink => fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()),
        FileOp::NotEmpty => stat().is_some_and(|m| m.len() > 0),
        FileOp::Socket
        | FileOp::NamedPipe
        | FileOp::BlockDevice
        | FileOp::CharDevice
        | FileOp::Setuid
        | FileOp::Setgid
        | FileOp::Sticky => stat().is_some_and(|m| special_file(op, &m)),
        FileOp::NewerThan | FileOp::OlderThan => {
            let a = modified(value)?;
            let b = modified(compare)?;
            if op == FileOp::NewerThan {
                a > b
            } else {
                a < b
            }
        }
        FileOp::Binary => match which::which(value) {
            Ok(_) => true,
            Err(which::Error::CannotFindBinaryPath) => false,
            Err(source) => {
                return Err(ConditionError::BinaryLookup {
                    name: value.to_string(),
                    source,
                })
            }
        },
    })
}

fn modified(path: &str) -> ConditionResult<std::time::SystemTime> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|source| ConditionError::FileAccess {
            path: path.to_string(),
            source,
        })
}

#[cfg(unix)]
fn special_file(op: FileOp, meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::{FileTypeExt, PermissionsExt};
    let ft = meta.file_type();
    let mode = meta.permissions().mode();
    match op {
        FileOp::Socket => ft.is_socket(),
        FileOp::NamedPipe => ft.is_fifo(),
        FileOp::BlockDevice => ft.is_block_device(),
        FileOp::CharDevice => ft.is_char_device(),
        FileOp::Setuid => mode & 0o4000 != 0,
        FileOp::Setgid => mode & 0o2000 != 0,
        FileOp::Sticky => mode & 0o1000 != 0,
        _ => false,
    }
}

#[cfg(not(unix))]
fn special_file(_op: FileOp, _meta: &fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn check(value: &str, operator: &str, compare: Option<&str>) -> ConditionResult<bool> {
        check_condition(&EnvContext::new(), value, operator, compare)
    }

    #[test]
    fn test_default_operator_is_bool_true() {
        assert!(!check("", "", None).unwrap());
        assert!(check("yes", "", None).unwrap());
        assert!(check("TRUE", "", None).unwrap());
        assert!(matches!(check("maybe", "", None), Err(ConditionError::InvalidBool(_))));
    }

    #[test]
    fn test_default_operator_with_compare_is_string_equal() {
        assert!(check("abc", "", Some("abc")).unwrap());
        assert!(!check("abc", "", Some("abd")).unwrap());
    }

    #[test]
    fn test_string_aliases() {
        assert!(check("abc", "==", Some("abc")).unwrap());
        assert!(check("abc", "!=", Some("abd")).unwrap());
        assert!(check("abc", "<", Some("abd")).unwrap());
        assert!(check("b", ">=", Some("a")).unwrap());
        assert!(check("", "-z", None).unwrap());
        assert!(check("x", "string_notEmpty", None).unwrap());
    }

    #[test]
    fn test_string_regexp() {
        assert!(check("release-1.2", "=~", Some("^release-[0-9]+\\.[0-9]+$")).unwrap());
        assert!(!check("dev", "string_regexp", Some("^release")).unwrap());
        assert!(matches!(
            check("x", "=~", Some("(unclosed")),
            Err(ConditionError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_parse_int_prefixes() {
        assert_eq!(parse_int("0x1A").unwrap(), 26);
        assert_eq!(parse_int("0o12").unwrap(), 10);
        assert_eq!(parse_int("0b101").unwrap(), 5);
        assert_eq!(parse_int("26").unwrap(), 26);
        assert_eq!(parse_int("-0x10").unwrap(), -16);
        assert!(parse_int("0x").is_err());
        assert!(parse_int("abc").is_err());
        assert!(parse_int("").is_err());
        assert!(parse_int("--1").is_err());
    }

    #[test]
    fn test_parse_int_extremes() {
        assert_eq!(parse_int("-9223372036854775808").unwrap(), i64::MIN);
        assert_eq!(parse_int("9223372036854775807").unwrap(), i64::MAX);
        assert_eq!(parse_int("-0x8000000000000000").unwrap(), i64::MIN);
        assert!(parse_int("9223372036854775808").is_err());
        assert!(parse_int("-9223372036854775809").is_err());
    }

    #[test]
    fn test_number_comparisons() {
        assert!(check("0x1A", "-eq", Some("26")).unwrap());
        assert!(check("0b101", "number_lessThan", Some("0o12")).unwrap());
        assert!(check("10", "-gt", Some("9")).unwrap());
        // lexicographic order would say otherwise
        assert!(!check("10", ">", Some("9")).unwrap());
    }

    #[test]
    fn test_number_parse_failure_is_error() {
        match check("ten", "-eq", Some("10")) {
            Err(ConditionError::InvalidInteger(v)) => assert_eq!(v, "ten"),
            other => panic!("expected integer error, got {:?}", other),
        }
        assert!(check("10", "-eq", Some("x")).is_err());
    }

    #[test]
    fn test_number_empty_operand_is_zero() {
        assert!(check("", "-eq", Some("0")).unwrap());
        assert!(!check("", "-gt", Some("0")).unwrap());
        assert!(check("1", "-gt", Some("")).unwrap());
        assert!(check("", "number_equal", Some("")).unwrap());
        assert!(check(" ", "-eq", Some("0")).is_err());
    }

    #[test]
    fn test_condition_from_unquoted_yaml() {
        let cond: Condition = serde_yaml::from_str("{value: 10, operator: -gt, compare: 9}").unwrap();
        assert_eq!(cond.value, "10");
        assert_eq!(cond.compare.as_deref(), Some("9"));
        assert!(cond.evaluate(&EnvContext::new()).unwrap());

        let cond: Condition = serde_yaml::from_str("{value: true}").unwrap();
        assert_eq!(cond.compare, None);
        assert!(cond.evaluate(&EnvContext::new()).unwrap());
    }

    #[test]
    fn test_bool_operators() {
        assert!(check("no", "!", None).unwrap());
        assert!(check("yes", "&&", Some("1")).unwrap());
        assert!(!check("yes", "bool_and", Some("")).unwrap());
        assert!(check("false", "||", Some("Yes")).unwrap());
        assert!(check("false", "||", Some("bogus")).is_err());
    }

    #[test]
    fn test_arity_checks() {
        assert!(matches!(
            check("x", "-e", Some("y")),
            Err(ConditionError::UnexpectedCompare(_))
        ));
        assert!(matches!(
            check("x", "bool_not", Some("y")),
            Err(ConditionError::UnexpectedCompare(_))
        ));
        assert!(matches!(check("x", "-eq", None), Err(ConditionError::MissingCompare(_))));
    }

    #[test]
    fn test_unknown_operator() {
        assert!(matches!(
            check("x", "bogus", None),
            Err(ConditionError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_env_defined() {
        let root = EnvContext::new().with_vars([("SET_HERE", "")]);
        let child = root.child();
        assert!(check_condition(&child, "SET_HERE", "-v", None).unwrap());
        assert!(!check_condition(&child, "NOT_SET", "env_defined", None).unwrap());
    }

    #[test]
    fn test_file_predicates() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        let empty = temp_dir.path().join("empty.txt");
        std::fs::write(&file, "content").unwrap();
        std::fs::write(&empty, "").unwrap();
        let dir = temp_dir.path().to_string_lossy().to_string();
        let file = file.to_string_lossy().to_string();
        let empty = empty.to_string_lossy().to_string();

        assert!(check(&file, "-e", None).unwrap());
        assert!(check(&file, "-f", None).unwrap());
        assert!(!check(&file, "-d", None).unwrap());
        assert!(check(&dir, "-d", None).unwrap());
        assert!(check(&file, "-s", None).unwrap());
        assert!(!check(&empty, "-s", None).unwrap());
        assert!(!check("/no/such/path/here", "-e", None).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_symlink_and_modes() {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target");
        let link = temp_dir.path().join("link");
        std::fs::write(&target, "x").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o644)).unwrap();

        let target = target.to_string_lossy().to_string();
        let link = link.to_string_lossy().to_string();
        assert!(check(&link, "-L", None).unwrap());
        assert!(!check(&target, "-h", None).unwrap());
        assert!(!check(&target, "-u", None).unwrap());
        assert!(!check(&target, "-p", None).unwrap());
        assert!(check("/dev/null", "-c", None).unwrap());
    }

    #[test]
    fn test_newer_and_older() {
        use filetime::{set_file_mtime, FileTime};
        let temp_dir = TempDir::new().unwrap();
        let old = temp_dir.path().join("old");
        let new = temp_dir.path().join("new");
        std::fs::write(&old, "").unwrap();
        std::fs::write(&new, "").unwrap();
        set_file_mtime(&old, FileTime::from_unix_time(1_000_000, 0)).unwrap();
        set_file_mtime(&new, FileTime::from_unix_time(2_000_000, 0)).unwrap();
        let old = old.to_string_lossy().to_string();
        let new = new.to_string_lossy().to_string();

        assert!(check(&new, "-nt", Some(&old)).unwrap());
        assert!(check(&old, "file_olderThan", Some(&new)).unwrap());
        assert!(!check(&old, "-nt", Some(&new)).unwrap());
        assert!(matches!(
            check(&old, "-nt", Some("/no/such/file")),
            Err(ConditionError::FileAccess { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_binary_lookup() {
        assert!(check("sh", "file_binary", None).unwrap());
        assert!(!check("tash-definitely-not-installed", "file_binary", None).unwrap());
    }

    #[test]
    fn test_condition_expands_operands() {
        let ctx = EnvContext::new().with_vars([("mode", "release")]);
        let cond = Condition {
            value: "${mode}".to_string(),
            operator: "==".to_string(),
            compare: Some("release".to_string()),
        };
        assert!(cond.evaluate(&ctx).unwrap());
    }
}
