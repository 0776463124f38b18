//! HTTP downloads to temporary files

use crate::error::{FileOpError, FileOpResult};
use reqwest::blocking::Client;
use std::env;
use std::io;
use std::path::PathBuf;

/// Download `url` into a new temporary file and return its path
///
/// Any status of 300 or above is an error carrying the status line. The
/// temporary file is removed if the body cannot be written completely.
pub fn download_file(url: &str) -> FileOpResult<PathBuf> {
    download_with(&Client::new(), url)
}

/// Download with a caller-provided client
pub fn download_with(client: &Client, url: &str) -> FileOpResult<PathBuf> {
    tracing::debug!(url, "downloading");
    let mut response = client.get(url).send()?;
    let status = response.status();
    if status.as_u16() >= 300 {
        return Err(FileOpError::HttpStatus {
            status: status.to_string(),
        });
    }

    let mut tmp = tempfile::Builder::new()
        .prefix("tash")
        .tempfile()
        .map_err(|e| FileOpError::io("create tmp file failed", env::temp_dir(), e))?;
    // on error `tmp` is dropped, which deletes the partial file
    io::copy(&mut response, &mut tmp)
        .map_err(|e| FileOpError::io("download file failed", tmp.path(), e))?;
    let (_, path) = tmp
        .keep()
        .map_err(|e| FileOpError::io("keep tmp file failed", e.file.path(), e.error))?;
    tracing::debug!(url, path = %path.display(), "download complete");
    Ok(path)
}
