//! Block glob expansion

use crate::error::{FileOpError, FileOpResult};
use crate::utils::split_blocks;
use std::fs;
use std::io;
use std::path::Path;

/// Expand a block of glob patterns
///
/// The block is split on newlines, then semicolons; each pattern is matched
/// on its own and all matches are sorted and deduplicated. With
/// `must_be_file`, only existing non-directory paths are kept. A pattern that
/// matches nothing is not an error.
pub fn glob_expand(block: &str, must_be_file: bool) -> FileOpResult<Vec<String>> {
    glob_expand_in(Path::new(""), block, must_be_file)
}

/// Like [`glob_expand`], with relative patterns resolved against `base`
///
/// Matches under `base` are returned relative to it, the way they were
/// written in the pattern.
pub fn glob_expand_in(base: &Path, block: &str, must_be_file: bool) -> FileOpResult<Vec<String>> {
    let mut matched = Vec::new();
    for pattern in split_blocks(block) {
        let rooted = Path::new(&pattern).is_absolute() || base.as_os_str().is_empty();
        let full = if rooted {
            pattern.clone()
        } else {
            base.join(&pattern).to_string_lossy().into_owned()
        };
        let paths = ::glob::glob(&full).map_err(|e| FileOpError::Glob {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(e) if e.error().kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(FileOpError::Glob {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })
                }
            };
            let path = if rooted {
                path
            } else {
                path.strip_prefix(base).map(Path::to_path_buf).unwrap_or(path)
            };
            matched.push(path.to_string_lossy().into_owned());
        }
        tracing::debug!(pattern = %pattern, total = matched.len(), "glob matched");
    }
    matched.sort();
    matched.dedup();

    if must_be_file {
        matched.retain(|p| {
            let full = if base.as_os_str().is_empty() || Path::new(p).is_absolute() {
                Path::new(p).to_path_buf()
            } else {
                base.join(p)
            };
            fs::metadata(full).is_ok_and(|m| !m.is_dir())
        });
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for dir in ["a", "b", "c", "c/sub.txt"] {
            fs::create_dir_all(temp_dir.path().join(dir)).unwrap();
        }
        for file in ["a/1.txt", "a/2.txt", "b/1.txt", "c/3.txt", "c/skip.md"] {
            fs::write(temp_dir.path().join(file), file).unwrap();
        }
        temp_dir
    }

    #[test]
    fn test_block_patterns_are_independent() {
        let temp_dir = layout();
        let found = glob_expand_in(temp_dir.path(), "a/*.txt\nb/*.txt;c/*.txt", false).unwrap();
        assert_eq!(found, vec!["a/1.txt", "a/2.txt", "b/1.txt", "c/3.txt", "c/sub.txt"]);
    }

    #[test]
    fn test_duplicates_removed() {
        let temp_dir = layout();
        let found = glob_expand_in(temp_dir.path(), "a/1.txt; a/*.txt\n a/1.txt", false).unwrap();
        assert_eq!(found, vec!["a/1.txt", "a/2.txt"]);
    }

    #[test]
    fn test_files_only() {
        let temp_dir = layout();
        let found = glob_expand_in(temp_dir.path(), "c/*.txt", true).unwrap();
        assert_eq!(found, vec!["c/3.txt"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let temp_dir = layout();
        let found = glob_expand_in(temp_dir.path(), "nothing/*.bin", false).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_recursive_pattern() {
        let temp_dir = layout();
        let found = glob_expand_in(temp_dir.path(), "**/*.md", true).unwrap();
        assert_eq!(found, vec!["c/skip.md"]);
    }

    #[test]
    fn test_absolute_patterns() {
        let temp_dir = layout();
        let pattern = format!("{}/a/*.txt", temp_dir.path().display());
        let found = glob_expand(&pattern, true).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("1.txt"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(glob_expand("a/[", false), Err(FileOpError::Glob { .. })));
    }
}
