//! Append-only fingerprint log with an in-memory index.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use super::entry::CacheEntry;
use crate::config::CacheMode;
use crate::fingerprint::Fingerprint;

/// Errors that make the cache unusable for the run.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A line in the log is not a valid record.
    #[error("Malformed cache line {line} in {path}")]
    MalformedLine {
        /// Cache file
        path: PathBuf,
        /// 1-based line number
        line: usize,
    },

    /// The log exists but could not be read.
    #[error("Failed to read cache {path}: {source}")]
    Read {
        /// Cache file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The log could not be opened for appending.
    #[error("Failed to open cache {path} for writing: {source}")]
    Open {
        /// Cache file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An append failed.
    #[error("Failed to write cache {path}: {source}")]
    Write {
        /// Cache file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Fingerprint cache for one run.
///
/// Entries are indexed by absolute path in file order. Lookups read the
/// index loaded at open time; stores append to the log and do not update the
/// index, so a fingerprint computed in this run is served from the log only in
/// later runs.
#[derive(Debug)]
pub struct FingerprintCache {
    mode: CacheMode,
    path: Option<PathBuf>,
    entries: HashMap<PathBuf, Vec<CacheEntry>>,
    writer: Mutex<Option<File>>,
}

impl FingerprintCache {
    /// A cache that never hits and never writes.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            mode: CacheMode::Disabled,
            path: None,
            entries: HashMap::new(),
            writer: Mutex::new(None),
        }
    }

    /// Open the cache at `location` in the given mode.
    ///
    /// Read modes load the whole log; read-write mode also opens it for
    /// append (creating parent directories) so that an unwritable cache fails
    /// here rather than mid-run. `None` or [`CacheMode::Disabled`] yields a
    /// disabled cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the log is malformed, unreadable or cannot
    /// be opened for writing.
    pub fn open(location: Option<&Path>, mode: CacheMode) -> CacheResult<Self> {
        let Some(path) = location.filter(|_| mode.reads()) else {
            return Ok(Self::disabled());
        };

        let entries = load(path)?;
        let writer = if mode.writes() {
            Some(open_append(path)?)
        } else {
            None
        };

        log::debug!(
            "Opened {} cache {} ({} paths)",
            mode,
            path.display(),
            entries.len()
        );

        Ok(Self {
            mode,
            path: Some(path.to_path_buf()),
            entries,
            writer: Mutex::new(writer),
        })
    }

    /// Mode this cache was opened in.
    #[must_use]
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of distinct paths with at least one entry.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.entries.len()
    }

    /// First entry for `path` whose size and mtime match the current stat.
    #[must_use]
    pub fn lookup(&self, path: &Path, size: u64, mtime: i64) -> Option<&Fingerprint> {
        if !self.mode.reads() {
            return None;
        }
        self.entries
            .get(path)?
            .iter()
            .find(|entry| entry.matches(size, mtime))
            .map(|entry| &entry.fingerprint)
    }

    /// Append one record. A no-op unless the cache is read-write.
    ///
    /// Paths that cannot be written as one UTF-8 line are skipped with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Write`] if the append fails.
    pub fn store(
        &self,
        path: &Path,
        size: u64,
        mtime: i64,
        fingerprint: &Fingerprint,
    ) -> CacheResult<()> {
        if !self.mode.writes() {
            return Ok(());
        }
        let entry = CacheEntry::new(path.to_path_buf(), size, mtime, fingerprint.clone());
        let Some(line) = entry.to_line() else {
            log::warn!("Not caching {}: path cannot be stored", path.display());
            return Ok(());
        };

        // Each record is one write_all, so a poisoned handle is still whole.
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(file) = writer.as_mut() {
            file.write_all(line.as_bytes())
                .map_err(|source| CacheError::Write {
                    path: self.path.clone().unwrap_or_default(),
                    source,
                })?;
            log::trace!("Cached {}", path.display());
        }
        Ok(())
    }
}

/// Parse the whole log. A missing file is an empty cache.
fn load(path: &Path) -> CacheResult<HashMap<PathBuf, Vec<CacheEntry>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(source) => {
            return Err(CacheError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut entries: HashMap<PathBuf, Vec<CacheEntry>> = HashMap::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| CacheError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entry = CacheEntry::parse(&line).ok_or_else(|| CacheError::MalformedLine {
            path: path.to_path_buf(),
            line: idx + 1,
        })?;
        entries.entry(entry.path.clone()).or_default().push(entry);
    }
    Ok(entries)
}

fn open_append(path: &Path) -> CacheResult<File> {
    let open_err = |source| CacheError::Open {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(open_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_err)
}
