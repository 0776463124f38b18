//! Streaming hash verification

use crate::error::{FileOpError, FileOpResult};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Md5,
    Sha256,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 3] = [HashAlgorithm::Sha1, HashAlgorithm::Md5, HashAlgorithm::Sha256];

    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    /// Stream `reader` through the digest and return lowercase hex
    pub fn hex_digest<R: Read>(self, reader: R) -> io::Result<String> {
        match self {
            HashAlgorithm::Sha1 => digest_reader::<Sha1, R>(reader),
            HashAlgorithm::Md5 => digest_reader::<Md5, R>(reader),
            HashAlgorithm::Sha256 => digest_reader::<Sha256, R>(reader),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = FileOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashAlgorithm::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FileOpError::UnsupportedHash(s.to_string()))
    }
}

fn digest_reader<D: Digest + Write, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Check that `reader`'s content matches `sig`
///
/// The signature is compared case-insensitively. An unsupported algorithm or
/// an empty signature is an error before anything is read. `path` only names
/// the content in errors.
pub fn check_hash<R: Read>(path: &Path, alg: &str, sig: &str, reader: R) -> FileOpResult<bool> {
    let alg: HashAlgorithm = alg.parse()?;
    let sig = sig.trim();
    if sig.is_empty() {
        return Err(FileOpError::EmptySignature(path.display().to_string()));
    }
    let digest = alg
        .hex_digest(reader)
        .map_err(|e| FileOpError::io("check hash failed", path, e))?;
    tracing::debug!(path = %path.display(), alg = alg.name(), %digest, "computed digest");
    Ok(digest.eq_ignore_ascii_case(sig))
}

/// Check a file on disk against `sig`
pub fn check_file_hash(path: &Path, alg: &str, sig: &str) -> FileOpResult<bool> {
    // validate before touching the file
    alg.parse::<HashAlgorithm>()?;
    if sig.trim().is_empty() {
        return Err(FileOpError::EmptySignature(path.display().to_string()));
    }
    let file = File::open(path).map_err(|e| FileOpError::io("open file failed", path, e))?;
    check_hash(path, alg, sig, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const ABC_MD5: &str = "900150983cd24fb0d6963f7d28e17f72";
    const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";
    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn check(alg: &str, sig: &str) -> FileOpResult<bool> {
        check_hash(Path::new("abc"), alg, sig, Cursor::new(b"abc"))
    }

    #[test]
    fn test_known_digests() {
        assert!(check("md5", ABC_MD5).unwrap());
        assert!(check("sha1", ABC_SHA1).unwrap());
        assert!(check("sha256", ABC_SHA256).unwrap());
    }

    #[test]
    fn test_signature_is_case_insensitive() {
        assert!(check("sha256", &ABC_SHA256.to_uppercase()).unwrap());
        assert!(check("SHA1", ABC_SHA1).unwrap());
    }

    #[test]
    fn test_mismatch_is_false() {
        assert!(!check("md5", ABC_SHA1).unwrap());
        assert!(!check("sha256", "00").unwrap());
    }

    #[test]
    fn test_unsupported_algorithm() {
        assert!(matches!(check("crc32", ABC_MD5), Err(FileOpError::UnsupportedHash(_))));
        assert!(matches!(check("", ABC_MD5), Err(FileOpError::UnsupportedHash(_))));
    }

    #[test]
    fn test_empty_signature() {
        assert!(matches!(check("md5", ""), Err(FileOpError::EmptySignature(_))));
        assert!(matches!(check("md5", "  "), Err(FileOpError::EmptySignature(_))));
    }

    #[test]
    fn test_usage_error_before_io() {
        let err = check_file_hash(Path::new("/no/such/file"), "whirlpool", "aa").unwrap_err();
        assert!(matches!(err, FileOpError::UnsupportedHash(_)));
    }

    #[test]
    fn test_check_file_hash() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("abc.txt");
        std::fs::write(&path, "abc").unwrap();
        assert!(check_file_hash(&path, "md5", ABC_MD5).unwrap());
    }
}
