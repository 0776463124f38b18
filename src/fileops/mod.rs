//! Filesystem operations used by actions
//!
//! Recursive copy, streaming hash verification, downloads, in-place content
//! replacement and block glob expansion.

pub mod copy;
pub mod download;
pub mod globs;
pub mod hash;
pub mod replace;

pub use copy::*;
pub use download::*;
pub use globs::*;
pub use hash::*;
pub use replace::*;

use crate::error::{FileOpError, FileOpResult};
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// Open a file for writing, creating parent directories
///
/// The file is truncated unless `append` is set.
pub fn open_output(path: &Path, append: bool) -> FileOpResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| FileOpError::io("create parent directories failed", parent, e))?;
    }
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    if append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    options
        .open(path)
        .map_err(|e| FileOpError::io("open output file failed", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_open_output_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a/b/out.log");
        open_output(&path, false).unwrap().write_all(b"one").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one");
    }

    #[test]
    fn test_open_output_append_and_truncate() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.log");
        open_output(&path, false).unwrap().write_all(b"one").unwrap();
        open_output(&path, true).unwrap().write_all(b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "onetwo");
        open_output(&path, false).unwrap().write_all(b"three").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "three");
    }
}
