//! Cache record format.
//!
//! One record per line: `<mtime> <fsize> <fingerprint> <absolute-path>`.
//! The path is everything after the third separator and may contain spaces.

use std::path::{Path, PathBuf};

use crate::fingerprint::Fingerprint;

/// A single fingerprint record in the cache log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Absolute path of the image
    pub path: PathBuf,
    /// File size in bytes when the fingerprint was computed
    pub size: u64,
    /// Modification time (seconds since the Unix epoch) at that point
    pub mtime: i64,
    /// The fingerprint
    pub fingerprint: Fingerprint,
}

impl CacheEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, mtime: i64, fingerprint: Fingerprint) -> Self {
        Self {
            path,
            size,
            mtime,
            fingerprint,
        }
    }

    /// Whether this entry is valid for a file with the given stat values.
    #[must_use]
    pub fn matches(&self, size: u64, mtime: i64) -> bool {
        self.size == size && self.mtime == mtime
    }

    /// Parse one log line (without its trailing newline).
    ///
    /// Returns `None` for anything that is not a well-formed record.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let (mtime, rest) = split_field(line)?;
        let (size, rest) = split_field(rest)?;
        let (fingerprint, path) = split_field(rest)?;
        if path.is_empty() {
            return None;
        }
        Some(Self {
            mtime: mtime.parse().ok()?,
            size: size.parse().ok()?,
            fingerprint: Fingerprint::from_hex(fingerprint).ok()?,
            path: PathBuf::from(path),
        })
    }

    /// Format as a log line including the trailing newline.
    ///
    /// Returns `None` when the path cannot be stored on a single UTF-8 line.
    #[must_use]
    pub fn to_line(&self) -> Option<String> {
        let path = storable_path(&self.path)?;
        Some(format!(
            "{} {} {} {}\n",
            self.mtime, self.size, self.fingerprint, path
        ))
    }
}

/// Split off one whitespace-delimited field; the remainder has its leading
/// whitespace removed.
fn split_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace)?;
    let (field, rest) = s.split_at(end);
    Some((field, rest.trim_start()))
}

fn storable_path(path: &Path) -> Option<&str> {
    path.to_str().filter(|p| !p.contains(['\n', '\r']))
}
