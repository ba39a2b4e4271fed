//! Input file discovery.
//!
//! - [`walker`]: sorted directory listing
//! - [`collect_inputs`]: turns command-line arguments (files and directories)
//!   into an ordered file list
//! - [`read_path_list`]: newline-delimited path lists, as read from stdin

pub mod walker;

use std::io::BufRead;
use std::path::PathBuf;

use thiserror::Error;

pub use walker::Walker;

/// Errors while discovering input files.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The directory could not be traversed.
    #[error("Failed to read directory {path}: {source}")]
    Walk {
        /// Directory being listed
        path: PathBuf,
        /// The underlying walk error
        #[source]
        source: walkdir::Error,
    },

    /// Reading a path list failed.
    #[error("Failed to read file list: {0}")]
    ListRead(#[source] std::io::Error),
}

/// Expand arguments into files, preserving argument order.
///
/// Regular files pass through unchanged. Directories expand to their files in
/// sorted order, recursively when `recursive` is set. Missing paths are kept so
/// that they surface later as per-file failures.
///
/// # Errors
///
/// Returns [`ScanError`] if a directory cannot be listed.
pub fn collect_inputs(args: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, ScanError> {
    let mut files = Vec::with_capacity(args.len());
    for arg in args {
        if arg.is_dir() {
            files.extend(Walker::new(arg, recursive).files()?);
        } else {
            files.push(arg.clone());
        }
    }
    Ok(files)
}

/// Read one path per line, skipping blank lines.
///
/// # Errors
///
/// Returns [`ScanError::ListRead`] on read failure or invalid UTF-8.
pub fn read_path_list<R: BufRead>(reader: R) -> Result<Vec<PathBuf>, ScanError> {
    let mut paths = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(ScanError::ListRead)?;
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            paths.push(PathBuf::from(line));
        }
    }
    Ok(paths)
}

/// Merge file lists, dropping repeated paths and keeping first occurrences.
#[must_use]
pub fn union_of<'a, I>(lists: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = &'a [PathBuf]>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for list in lists {
        for path in list {
            if seen.insert(path.as_path()) {
                out.push(path.clone());
            }
        }
    }
    out
}
