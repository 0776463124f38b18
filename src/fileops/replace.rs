//! In-place content replacement

use crate::error::{FileOpError, FileOpResult};
use regex::bytes::Regex;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

#[derive(Debug, Clone)]
enum Transform {
    Noop,
    Single(Vec<u8>, Vec<u8>),
    Literal(Vec<(Vec<u8>, Vec<u8>)>),
    Regex(Vec<(Regex, Vec<u8>)>),
}

/// A reusable content transform applied to whole files
#[derive(Debug, Clone)]
pub struct FileReplacer {
    transform: Transform,
}

impl FileReplacer {
    /// Build a replacer from `find, replace, find, replace, ...`
    ///
    /// Literal pairs are matched in a single left-to-right scan where the
    /// first matching pair wins. Regex pairs are applied one after another,
    /// each to the output of the previous one; replacements may use `$1`.
    pub fn new(args: &[String], is_regexp: bool) -> FileOpResult<Self> {
        if args.is_empty() {
            return Ok(FileReplacer {
                transform: Transform::Noop,
            });
        }
        if args.len() % 2 != 0 {
            return Err(FileOpError::OddReplaceArgs(args.len()));
        }

        let transform = if is_regexp {
            let pairs = args
                .chunks(2)
                .map(|pair| {
                    let re = Regex::new(&pair[0]).map_err(|source| FileOpError::InvalidRegex {
                        pattern: pair[0].clone(),
                        source,
                    })?;
                    Ok((re, pair[1].clone().into_bytes()))
                })
                .collect::<FileOpResult<Vec<_>>>()?;
            Transform::Regex(pairs)
        } else if args.len() == 2 {
            Transform::Single(args[0].clone().into_bytes(), args[1].clone().into_bytes())
        } else {
            Transform::Literal(
                args.chunks(2)
                    .map(|pair| (pair[0].clone().into_bytes(), pair[1].clone().into_bytes()))
                    .collect(),
            )
        };
        Ok(FileReplacer { transform })
    }

    /// Transform a buffer
    pub fn replace(&self, data: &[u8]) -> Vec<u8> {
        match &self.transform {
            Transform::Noop => data.to_vec(),
            Transform::Single(find, with) => replace_one(data, find, with),
            Transform::Literal(pairs) => replace_literal(data, pairs),
            Transform::Regex(pairs) => pairs.iter().fold(data.to_vec(), |acc, (re, with)| {
                re.replace_all(&acc, with.as_slice()).into_owned()
            }),
        }
    }

    /// Rewrite the file at `path` in place
    ///
    /// The whole content is read before anything is written.
    pub fn apply(&self, path: &Path) -> FileOpResult<()> {
        if matches!(self.transform, Transform::Noop) {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| FileOpError::io("open file failed", path, e))?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| FileOpError::io("read file failed", path, e))?;

        let replaced = self.replace(&content);
        tracing::debug!(path = %path.display(), before = content.len(), after = replaced.len(), "replacing file content");

        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.set_len(0))
            .and_then(|_| file.write_all(&replaced))
            .map_err(|e| FileOpError::io("write file failed", path, e))
    }
}

/// Build a [`FileReplacer`]
pub fn file_replacer(args: &[String], is_regexp: bool) -> FileOpResult<FileReplacer> {
    FileReplacer::new(args, is_regexp)
}

fn replace_one(data: &[u8], find: &[u8], with: &[u8]) -> Vec<u8> {
    if find.is_empty() {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i..].starts_with(find) {
            out.extend_from_slice(with);
            i += find.len();
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

/// Single-scan literal replacement; empty find strings never match
fn replace_literal(data: &[u8], pairs: &[(Vec<u8>, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    'scan: while i < data.len() {
        for (find, with) in pairs {
            if !find.is_empty() && data[i..].starts_with(find) {
                out.extend_from_slice(with);
                i += find.len();
                continue 'scan;
            }
        }
        out.push(data[i]);
        i += 1;
    }
    out
}
