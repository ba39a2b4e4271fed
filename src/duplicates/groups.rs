//! Duplicate groups and run statistics.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Files judged similar to one source file.
///
/// `index` is the 1-based position of the source in the input list and
/// `paths[0]` is the source itself; the rest are its matches in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DupeGroup {
    /// 1-based position of the source file
    pub index: usize,
    /// Source first, then matches
    pub paths: Vec<PathBuf>,
}

impl DupeGroup {
    /// Start a group at `source`.
    #[must_use]
    pub fn new(index: usize, source: PathBuf) -> Self {
        Self {
            index,
            paths: vec![source],
        }
    }

    /// Add a matching file.
    pub fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// The file the group was built from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.paths[0]
    }

    /// Files other than the source.
    #[must_use]
    pub fn matches(&self) -> &[PathBuf] {
        &self.paths[1..]
    }

    /// Number of files including the source.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Never true: a group always holds its source.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Whether at least one file matched the source.
    #[must_use]
    pub fn has_matches(&self) -> bool {
        self.paths.len() > 1
    }
}

/// Summary of a deduplication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    /// Files in the input
    pub total_files: usize,
    /// Files without a fingerprint, never grouped
    pub unfingerprinted: usize,
    /// Groups emitted
    pub groups: usize,
    /// Files placed in a group, sources included
    pub grouped_files: usize,
}

impl DedupStats {
    /// Compute from an input size and the resulting groups.
    #[must_use]
    pub fn from_groups(total_files: usize, unfingerprinted: usize, groups: &[DupeGroup]) -> Self {
        Self {
            total_files,
            unfingerprinted,
            groups: groups.len(),
            grouped_files: groups.iter().map(DupeGroup::len).sum(),
        }
    }
}
