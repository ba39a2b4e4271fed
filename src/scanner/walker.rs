//! Directory listing with walkdir.
//!
//! Output is sorted by file name at every level so that runs over the same
//! tree always see files in the same order; dedup results depend on it.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::ScanError;

/// Lists the regular files below a root directory.
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    recursive: bool,
}

impl Walker {
    /// Walker over `root`. Without `recursive` only its immediate files are
    /// listed.
    #[must_use]
    pub fn new(root: &Path, recursive: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            recursive,
        }
    }

    /// Collect the files in traversal order.
    ///
    /// Unreadable entries below the root are logged and skipped. Symlinks
    /// are followed; walkdir reports loops as entry errors.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotFound`] or [`ScanError::NotADirectory`] for a
    /// bad root, and [`ScanError::Walk`] if the root itself cannot be read.
    pub fn files(&self) -> Result<Vec<PathBuf>, ScanError> {
        if !self.root.exists() {
            return Err(ScanError::NotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }

        let mut walk = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        if !self.recursive {
            walk = walk.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walk {
            match entry {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) if e.depth() == 0 => {
                    return Err(ScanError::Walk {
                        path: self.root.clone(),
                        source: e,
                    })
                }
                Err(e) => log::warn!("Skipping unreadable entry: {e}"),
            }
        }
        log::debug!("Listed {} files under {}", files.len(), self.root.display());
        Ok(files)
    }
}
