//! Recursive copy

use crate::error::{FileOpError, FileOpResult};
use std::fs::{self, File, Permissions};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Copy `src` to `dst`, replacing whatever `dst` was
///
/// Files keep their permission bits. Directories are mirrored recursively;
/// a directory whose mode differs from the default gets it back only after
/// the whole tree is written, so a read-only source directory never blocks
/// the copy of its own contents.
pub fn copy_path(dst: &Path, src: &Path) -> FileOpResult<()> {
    let stat =
        fs::metadata(src).map_err(|e| FileOpError::io("read source path status failed", src, e))?;
    remove_all(dst).map_err(|e| FileOpError::io("remove dst path failed", dst, e))?;
    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| FileOpError::io("create dst parent directory tree failed", parent, e))?;
    }

    if !stat.is_dir() {
        tracing::debug!(src = %src.display(), dst = %dst.display(), "copying file");
        return copy_file(dst, src).map_err(|e| FileOpError::io("copy file failed", src, e));
    }

    tracing::debug!(src = %src.display(), dst = %dst.display(), "copying directory tree");
    let fixups = copy_tree(dst, src).map_err(|e| FileOpError::io("copy path tree failed", src, e))?;
    // deepest first, so a restricted parent cannot block its children
    for (dir, perms) in fixups.into_iter().rev() {
        fs::set_permissions(&dir, perms).map_err(|e| FileOpError::io("fix dir mode failed", &dir, e))?;
    }
    Ok(())
}

/// Copy one file's bytes and permission bits, removing `dst` on failure
fn copy_file(dst: &Path, src: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let perms = input.metadata()?.permissions();
    let mut output = File::create(dst)?;
    let result = io::copy(&mut input, &mut output).and_then(|_| fs::set_permissions(dst, perms));
    if result.is_err() {
        drop(output);
        let _ = fs::remove_file(dst);
    }
    result.map(|_| ())
}

/// Mirror the tree, returning the directory modes to restore afterwards
fn copy_tree(dst: &Path, src: &Path) -> io::Result<Vec<(PathBuf, Permissions)>> {
    let mut fixups = Vec::new();
    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = if rel.as_os_str().is_empty() {
            dst.to_path_buf()
        } else {
            dst.join(rel)
        };
        if entry.file_type().is_dir() {
            fs::create_dir(&target)?;
            if let Some(perms) = non_default_dir_mode(&entry.metadata()?) {
                fixups.push((target, perms));
            }
        } else {
            copy_file(&target, entry.path())?;
        }
    }
    Ok(fixups)
}

#[cfg(unix)]
fn non_default_dir_mode(meta: &fs::Metadata) -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode() & 0o7777;
    (mode != 0o755).then(|| Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn non_default_dir_mode(meta: &fs::Metadata) -> Option<Permissions> {
    let perms = meta.permissions();
    perms.readonly().then_some(perms)
}

/// Remove a file, symlink or directory tree; a missing path is fine
fn remove_all(path: &Path) -> io::Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
