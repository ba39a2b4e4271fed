//! Directory-level similarity report for regression testing.
//!
//! Each directory is expected to hold variants of one picture. A healthy
//! configuration gives a high minimum similarity inside every directory and a
//! low maximum similarity against every other directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;
use crate::compare::{similarity, CompareError};
use crate::config::Colorspace;
use crate::fetch::{Fetcher, FileFingerprint};
use crate::fingerprint::ImageBackend;
use crate::progress::{ProgressCallback, PHASE_COMPARE};
use crate::scanner::{union_of, ScanError, Walker};

/// Pairs between progress updates.
const PROGRESS_STRIDE: usize = 256;

/// Failures that abort a batch run.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A directory could not be listed.
    #[error("Cannot list test directory")]
    Scan(#[from] ScanError),

    /// The cache failed while fingerprinting.
    #[error("Cache failure during batch run")]
    Cache(#[from] CacheError),

    /// Fingerprints from different configurations were mixed.
    #[error("Cannot compare fingerprints")]
    Compare(#[from] CompareError),
}

/// Highest similarity between one directory and another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossReport {
    /// The other directory
    pub other: PathBuf,
    /// Maximum over all cross pairs, `None` if either side has no files
    pub max_mismatch: Option<f64>,
}

/// Report for one directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryReport {
    /// The directory
    pub dir: PathBuf,
    /// Files found in it
    pub files: usize,
    /// Minimum over intra-directory pairs, `None` with fewer than two files
    pub min_match: Option<f64>,
    /// One entry per other directory, in argument order
    pub max_mismatch: Vec<CrossReport>,
}

/// Symmetric pairwise similarities over a file list, keyed by unordered
/// index pair.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    index: HashMap<PathBuf, usize>,
    scores: HashMap<(usize, usize), f64>,
    present: Vec<bool>,
}

impl SimilarityMatrix {
    /// Compare every pair of `files` once.
    ///
    /// # Errors
    ///
    /// Returns [`CompareError`] if two fingerprints differ in length.
    pub fn build(
        files: &[FileFingerprint],
        colorspace: Colorspace,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<Self, CompareError> {
        let n = files.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .collect();

        if let Some(progress) = progress {
            progress.on_phase_start(PHASE_COMPARE, pairs.len());
        }
        let total = pairs.len();
        let done = AtomicUsize::new(0);
        let scores = pairs
            .par_iter()
            .map(|&(i, j)| -> Result<_, CompareError> {
                let pct = similarity(
                    files[i].fingerprint.as_ref(),
                    files[j].fingerprint.as_ref(),
                    colorspace,
                )?;
                if let Some(progress) = progress {
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if n % PROGRESS_STRIDE == 0 || n == total {
                        progress.on_progress(n, &files[i].path.to_string_lossy());
                    }
                }
                Ok(((i, j), pct))
            })
            .collect::<Result<HashMap<_, _>, CompareError>>()?;
        if let Some(progress) = progress {
            progress.on_phase_end(PHASE_COMPARE);
        }

        Ok(Self {
            index: files
                .iter()
                .enumerate()
                .map(|(i, f)| (f.path.clone(), i))
                .collect(),
            scores,
            present: files.iter().map(|f| f.fingerprint.is_some()).collect(),
        })
    }

    /// Number of files in the matrix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.present.len()
    }

    /// Whether the matrix is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    /// Similarity of two files, `None` if either is not in the matrix.
    #[must_use]
    pub fn get(&self, a: &Path, b: &Path) -> Option<f64> {
        let i = *self.index.get(a)?;
        let j = *self.index.get(b)?;
        if i == j {
            return Some(if self.present[i] { 100.0 } else { 0.0 });
        }
        self.scores.get(&(i.min(j), i.max(j))).copied()
    }

    fn pairs_within<'a>(&'a self, files: &'a [PathBuf]) -> impl Iterator<Item = f64> + 'a {
        files.iter().enumerate().flat_map(move |(k, a)| {
            files[k + 1..].iter().filter_map(move |b| self.get(a, b))
        })
    }

    fn pairs_across<'a>(
        &'a self,
        left: &'a [PathBuf],
        right: &'a [PathBuf],
    ) -> impl Iterator<Item = f64> + 'a {
        left.iter()
            .flat_map(move |a| right.iter().filter_map(move |b| self.get(a, b)))
    }
}

/// List, fingerprint and compare `dirs`, returning one report per directory.
///
/// Directories are listed recursively in sorted order.
///
/// # Errors
///
/// Returns [`BatchError`] if a directory cannot be listed, the cache fails,
/// or fingerprints of different lengths meet.
pub fn run_batch<B: ImageBackend>(
    fetcher: &Fetcher<B>,
    dirs: &[PathBuf],
    colorspace: Colorspace,
    progress: Option<&dyn ProgressCallback>,
) -> Result<Vec<DirectoryReport>, BatchError> {
    let listings = dirs
        .iter()
        .map(|dir| Walker::new(dir, true).files())
        .collect::<Result<Vec<_>, _>>()?;

    let all = union_of(listings.iter().map(Vec::as_slice));
    let fingerprints = fetcher.fetch_all(&all)?;
    let matrix = SimilarityMatrix::build(&fingerprints, colorspace, progress)?;
    log::debug!(
        "Compared {} files across {} directories",
        matrix.len(),
        dirs.len()
    );

    Ok(reports(dirs, &listings, &matrix))
}

/// Build reports from per-directory listings and a matrix covering them.
#[must_use]
pub fn reports(
    dirs: &[PathBuf],
    listings: &[Vec<PathBuf>],
    matrix: &SimilarityMatrix,
) -> Vec<DirectoryReport> {
    dirs.iter()
        .zip(listings)
        .enumerate()
        .map(|(d, (dir, files))| {
            let min_match = matrix.pairs_within(files).reduce(f64::min);
            let max_mismatch = dirs
                .iter()
                .zip(listings)
                .enumerate()
                .filter(|&(o, _)| o != d)
                .map(|(_, (other, other_files))| CrossReport {
                    other: other.clone(),
                    max_mismatch: matrix.pairs_across(files, other_files).reduce(f64::max),
                })
                .collect();
            DirectoryReport {
                dir: dir.clone(),
                files: files.len(),
                min_match,
                max_mismatch,
            }
        })
        .collect()
}
