//! Cache-aware fingerprint retrieval.
//!
//! [`Fetcher`] serves a cached fingerprint while the file's size and mtime are
//! unchanged, and otherwise runs the pipeline and appends the result to the
//! cache. Batches run on a dedicated rayon pool sized by the `jobs` setting.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::cache::{CacheResult, FingerprintCache};
use crate::fingerprint::pipeline::PipelineConfig;
use crate::fingerprint::{
    Fingerprint, ImageBackend, ImageProcessingError, Pipeline, RasterBackend,
};
use crate::progress::{ProgressCallback, PHASE_FINGERPRINT};

/// A file and its fingerprint, `None` when fingerprinting failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFingerprint {
    /// Path as given by the caller
    pub path: PathBuf,
    /// The fingerprint, if one could be computed
    pub fingerprint: Option<Fingerprint>,
}

/// Size and modification time that key cache validity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Canonical absolute path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Whole seconds since the Unix epoch
    pub mtime: i64,
}

impl FileStat {
    /// Stat `path`, resolving it to an absolute canonical path.
    ///
    /// # Errors
    ///
    /// Returns [`ImageProcessingError::Metadata`] if the file cannot be
    /// resolved or stat'ed.
    pub fn read(path: &Path) -> Result<Self, ImageProcessingError> {
        let metadata_err = |source| ImageProcessingError::Metadata {
            path: path.to_path_buf(),
            source,
        };
        let absolute = fs::canonicalize(path).map_err(metadata_err)?;
        let meta = fs::metadata(&absolute).map_err(metadata_err)?;
        let modified = meta.modified().map_err(metadata_err)?;
        Ok(Self {
            path: absolute,
            size: meta.len(),
            mtime: DateTime::<Utc>::from(modified).timestamp(),
        })
    }
}

/// Fetches fingerprints through the cache.
pub struct Fetcher<B = RasterBackend> {
    pipeline: Pipeline<B>,
    cache: FingerprintCache,
    jobs: usize,
    progress: Option<Arc<dyn ProgressCallback>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Fetcher<RasterBackend> {
    /// Fetcher on the default raster backend.
    #[must_use]
    pub fn new(config: PipelineConfig, cache: FingerprintCache, jobs: usize) -> Self {
        Self::with_pipeline(Pipeline::new(config), cache, jobs)
    }
}

impl<B: ImageBackend> Fetcher<B> {
    /// Fetcher around an existing pipeline.
    #[must_use]
    pub fn with_pipeline(pipeline: Pipeline<B>, cache: FingerprintCache, jobs: usize) -> Self {
        Self {
            pipeline,
            cache,
            jobs: jobs.max(1),
            progress: None,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Report batch progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The cache in use.
    #[must_use]
    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    /// Cache hits and misses so far.
    #[must_use]
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Fingerprint one file.
    ///
    /// The outer result fails only for cache errors; the inner one carries a
    /// per-file failure.
    ///
    /// # Errors
    ///
    /// Returns [`crate::cache::CacheError`] if appending to the cache fails.
    pub fn fetch(
        &self,
        path: &Path,
    ) -> CacheResult<Result<Fingerprint, ImageProcessingError>> {
        let stat = match FileStat::read(path) {
            Ok(stat) => stat,
            Err(e) => return Ok(Err(e)),
        };

        if let Some(fp) = self.cache.lookup(&stat.path, stat.size, stat.mtime) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::trace!("Cache hit: {}", stat.path.display());
            return Ok(Ok(fp.clone()));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let fp = match self.pipeline.compute(&stat.path) {
            Ok(fp) => fp,
            Err(e) => return Ok(Err(e)),
        };
        self.cache.store(&stat.path, stat.size, stat.mtime, &fp)?;
        Ok(Ok(fp))
    }

    /// Fingerprint every file, in parallel, preserving input order.
    ///
    /// A file listed more than once (under any spelling that resolves to the
    /// same canonical path) is fingerprinted once and the result repeated.
    /// Files that fail are logged at `warn` and returned with no fingerprint.
    ///
    /// # Errors
    ///
    /// Returns the first [`crate::cache::CacheError`] encountered.
    pub fn fetch_all(&self, paths: &[PathBuf]) -> CacheResult<Vec<FileFingerprint>> {
        let (distinct, slots) = distinct_inputs(paths);
        if distinct.len() < paths.len() {
            log::debug!(
                "{} repeated inputs share a fingerprint",
                paths.len() - distinct.len()
            );
        }

        if let Some(progress) = &self.progress {
            progress.on_phase_start(PHASE_FINGERPRINT, distinct.len());
        }
        log::info!(
            "Fingerprinting {} files with {} workers",
            distinct.len(),
            self.jobs
        );

        let done = AtomicUsize::new(0);
        let job = || {
            distinct
                .par_iter()
                .map(|path| -> CacheResult<Option<Fingerprint>> {
                    let fingerprint = match self.fetch(path)? {
                        Ok(fp) => Some(fp),
                        Err(e) => {
                            log::warn!("{e}");
                            None
                        }
                    };
                    if let Some(progress) = &self.progress {
                        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                        progress.on_progress(n, &path.to_string_lossy());
                    }
                    Ok(fingerprint)
                })
                .collect::<CacheResult<Vec<_>>>()
        };

        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
        {
            Ok(pool) => pool.install(job),
            Err(e) => {
                log::warn!(
                    "Failed to create worker pool ({e}), using global pool with {} threads",
                    rayon::current_num_threads()
                );
                job()
            }
        };

        if let Some(progress) = &self.progress {
            progress.on_phase_end(PHASE_FINGERPRINT);
        }
        let (hits, misses) = self.stats();
        log::debug!("Cache: {hits} hits, {misses} misses");

        let fingerprints = results?;
        Ok(paths
            .iter()
            .zip(slots)
            .map(|(path, slot)| FileFingerprint {
                path: path.clone(),
                fingerprint: fingerprints[slot].clone(),
            })
            .collect())
    }
}

/// First occurrence of each distinct file, and for every input the index of
/// its first occurrence in that list.
///
/// Paths are keyed by canonical form; paths that cannot be resolved are
/// keyed as given and fail later in [`Fetcher::fetch`].
fn distinct_inputs(paths: &[PathBuf]) -> (Vec<&PathBuf>, Vec<usize>) {
    let mut seen: HashMap<PathBuf, usize> = HashMap::with_capacity(paths.len());
    let mut distinct = Vec::with_capacity(paths.len());
    let slots = paths
        .iter()
        .map(|path| {
            let key = fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            *seen.entry(key).or_insert_with(|| {
                distinct.push(path);
                distinct.len() - 1
            })
        })
        .collect();
    (distinct, slots)
}
