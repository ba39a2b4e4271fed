//! imgprint - perceptual image fingerprints
//!
//! Reduces images to compact hex fingerprints, caches them per file, measures
//! similarity between fingerprints and groups near-duplicate images.
//!
//! The command-line entry point is [`run_app`]; the library modules can be
//! used directly:
//!
//! ```no_run
//! use imgprint::cache::FingerprintCache;
//! use imgprint::config::Settings;
//! use imgprint::duplicates::find_dupes;
//! use imgprint::fetch::Fetcher;
//! use std::path::PathBuf;
//!
//! let settings = Settings::default();
//! let fetcher = Fetcher::new((&settings).into(), FingerprintCache::disabled(), settings.jobs);
//! let files = fetcher
//!     .fetch_all(&[PathBuf::from("a.jpg"), PathBuf::from("b.jpg")])
//!     .unwrap();
//! for group in find_dupes(&files, settings.threshold, settings.colorspace).unwrap() {
//!     println!("{:?}", group.paths);
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod cli;
pub mod compare;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::cache::FingerprintCache;
use crate::cli::{Cli, Commands, InputArgs};
use crate::compare::{find_matches, PairSimilarity};
use crate::config::Settings;
use crate::error::ExitCode;
use crate::fetch::Fetcher;
use crate::fingerprint::pipeline::PipelineConfig;
use crate::output::{render, OutputFormat, Report};
use crate::progress::{Progress, ProgressCallback};

/// Run the command described by `cli`.
///
/// Configuration and cache problems surface as errors before any file is
/// processed; per-file failures are logged and do not fail the run.
///
/// # Errors
///
/// Returns an error for invalid configuration, an unusable cache, unlistable
/// directories, mismatched fingerprints or output failures.
/// [`ExitCode::for_error`] maps it to a process exit code.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let common = cli.command.common();
    let settings = Settings::load(common.config.as_deref(), &common.overrides())?;
    log::debug!(
        "Settings: {} size {} {} quick-resize {} threshold {} cache {} jobs {}",
        settings.colorspace,
        settings.size,
        settings.square_mode,
        settings.quick_resize,
        settings.threshold,
        settings.cache_mode,
        settings.jobs
    );
    let format = common.output;

    if let Commands::Config(_) = &cli.command {
        print_config(&settings)?;
        return Ok(ExitCode::Success);
    }

    if let Some(dir) = &settings.debug_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create debug directory {}", dir.display()))?;
    }

    let cache_path = settings.cache_location()?;
    let cache = FingerprintCache::open(cache_path.as_deref(), settings.cache_mode)?;

    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(cli.quiet || cli.no_progress));
    let fetcher = Fetcher::new(PipelineConfig::from(&settings), cache, settings.jobs)
        .with_progress(Arc::clone(&progress));

    let out = io::stdout().lock();
    match &cli.command {
        Commands::Fingerprint(args) => {
            let files = gather_inputs(&args.paths, &args.input)?;
            let fingerprints = fetcher.fetch_all(&files)?;
            emit(&Report::Fingerprints(&fingerprints), format, out)?;
        }
        Commands::Compare(args) => {
            let fetched = fetcher.fetch_all(&[args.first.clone(), args.second.clone()])?;
            let pair = PairSimilarity::between(&fetched[0], &fetched[1], settings.colorspace)?;
            emit(&Report::Similarity(&pair), format, out)?;
        }
        Commands::Match(args) => {
            let mut files = vec![args.target.clone()];
            files.extend(gather_inputs(&args.paths, &args.input)?);
            let fetched = fetcher.fetch_all(&files)?;
            let (target, candidates) = fetched.split_at(1);
            let matches = find_matches(
                &target[0],
                candidates,
                settings.threshold,
                settings.colorspace,
            )?;
            emit(&Report::Matches(&matches), format, out)?;
        }
        Commands::FindDupes(args) | Commands::FindDupesOneline(args) => {
            let oneline = matches!(cli.command, Commands::FindDupesOneline(_));
            let files = gather_inputs(&args.paths, &args.input)?;
            let fetched = fetcher.fetch_all(&files)?;
            let groups =
                duplicates::find_dupes(&fetched, settings.threshold, settings.colorspace)?;
            emit(&Report::Dupes { groups: &groups, oneline }, format, out)?;
        }
        Commands::Test(args) => {
            let reports = batch::run_batch(
                &fetcher,
                &args.dirs,
                settings.colorspace,
                Some(progress.as_ref()),
            )?;
            emit(&Report::Batch(&reports), format, out)?;
        }
        Commands::Config(_) => {}
    }

    Ok(ExitCode::Success)
}

/// Positional paths (expanded) followed by any paths read from stdin.
fn gather_inputs(paths: &[PathBuf], input: &InputArgs) -> anyhow::Result<Vec<PathBuf>> {
    let mut args = paths.to_vec();
    if input.stdin {
        args.extend(scanner::read_path_list(io::stdin().lock())?);
    }
    let files = scanner::collect_inputs(&args, input.recursive)?;
    log::debug!("{} input files", files.len());
    Ok(files)
}

fn emit<W: Write>(report: &Report<'_>, format: OutputFormat, out: W) -> anyhow::Result<()> {
    render(report, format, out).context("Failed to write results")
}

fn print_config(settings: &Settings) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    let rendered =
        toml::to_string_pretty(settings).context("Failed to render configuration")?;
    write!(out, "{rendered}")?;
    match settings.cache_location()? {
        Some(path) => writeln!(out, "# cache: {}", path.display())?,
        None => writeln!(out, "# cache: disabled")?,
    }
    Ok(())
}
