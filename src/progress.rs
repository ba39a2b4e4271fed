//! Progress reporting using indicatif.
//!
//! [`Progress`] implements [`ProgressCallback`] with one terminal bar per
//! phase. Workers report from several threads at once, so the bar is shared
//! behind a mutex and positions are absolute counts, not increments.

use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Phase name used while fingerprinting files.
pub const PHASE_FINGERPRINT: &str = "fingerprint";

/// Phase name used while building a similarity matrix.
pub const PHASE_COMPARE: &str = "compare";

/// Receives progress updates from long-running phases.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase (e.g. [`PHASE_FINGERPRINT`])
    /// * `total` - Total number of items to process
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called after each item.
    ///
    /// # Arguments
    ///
    /// * `done` - Items finished so far, including this one
    /// * `path` - Item just finished
    fn on_progress(&self, done: usize, path: &str);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// Terminal progress reporter.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter. With `quiet` nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use imgprint::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn label(phase: &str) -> &'static str {
        match phase {
            PHASE_FINGERPRINT => "Fingerprinting",
            PHASE_COMPARE => "Comparing",
            _ => "Working",
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(bar) = guard.as_ref() {
            f(bar);
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        bar.set_style(Self::style());
        bar.set_message(Self::label(phase));
        *self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(bar);
    }

    fn on_progress(&self, done: usize, path: &str) {
        if self.quiet {
            return;
        }
        self.with_bar(|bar| {
            // Updates arrive out of order from parallel workers.
            if done as u64 > bar.position() {
                bar.set_position(done as u64);
            }
            bar.set_message(truncate_path(path, 30));
        });
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        let bar = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(bar) = bar {
            bar.finish_and_clear();
            log::debug!("{} complete", Self::label(phase));
        }
    }
}

/// Shorten a path for display, keeping the file name.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
