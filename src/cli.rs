//! Command-line interface definitions.
//!
//! Global options (verbosity, progress, error format) come before the
//! subcommand; fingerprinting options are shared by every subcommand through
//! [`CommonArgs`].
//!
//! # Example
//!
//! ```bash
//! # Fingerprint a directory tree
//! imgprint fingerprint -R ~/Pictures
//!
//! # Similarity of two files
//! imgprint compare a.jpg b.jpg --colorspace rgb12
//!
//! # Near-duplicate groups, one line per group
//! find ~/Pictures -name '*.jpg' | imgprint find-dupes-oneline --stdin --threshold 95
//!
//! # Regression report over directories of known variants
//! imgprint -v test fixtures/cats fixtures/dogs --output json
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{CacheMode, Colorspace, SettingsOverrides, SquareMode};
use crate::output::OutputFormat;

/// Perceptual image fingerprints and near-duplicate detection.
///
/// Images are reduced to a tiny blurred, equalized, quantized square and
/// encoded as hex. Fingerprints are cached per file until the file changes.
#[derive(Debug, Parser)]
#[command(name = "imgprint")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Do not draw progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Operating modes.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the fingerprint of each file
    Fingerprint(FilesArgs),
    /// Print the similarity of two files
    Compare(CompareArgs),
    /// Print files at least THRESHOLD percent similar to a target
    Match(MatchArgs),
    /// Group near-duplicates, one `index:path` line per file
    FindDupes(FilesArgs),
    /// Group near-duplicates, one line per group
    FindDupesOneline(FilesArgs),
    /// Report intra- and cross-directory similarity
    Test(TestArgs),
    /// Print the effective configuration and cache location
    Config(ConfigArgs),
}

/// Options shared by every mode.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Fingerprint colorspace
    #[arg(long, value_enum)]
    pub colorspace: Option<Colorspace>,

    /// Side length of the reduced square
    #[arg(short, long, value_name = "S")]
    pub size: Option<u32>,

    /// How non-square images are made square
    #[arg(long, value_enum)]
    pub square_mode: Option<SquareMode>,

    /// Shrink images to fit this many pixels before blurring (0 disables)
    #[arg(long, value_name = "PIXELS")]
    pub quick_resize: Option<u32>,

    /// Minimum similarity percentage for a match
    #[arg(short, long, value_name = "PCT")]
    pub threshold: Option<f64>,

    /// How the fingerprint cache is used
    #[arg(long, value_enum)]
    pub cache_mode: Option<CacheMode>,

    /// Use this cache file instead of the automatic per-configuration one
    #[arg(long, value_name = "PATH")]
    pub cache_file: Option<PathBuf>,

    /// Write each quantized image as a BMP into this directory
    #[arg(long, value_name = "DIR")]
    pub debug_dir: Option<PathBuf>,

    /// Number of fingerprinting workers
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Read settings from this TOML file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl CommonArgs {
    /// Flags that override lower configuration layers.
    #[must_use]
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            colorspace: self.colorspace,
            size: self.size,
            square_mode: self.square_mode,
            quick_resize: self.quick_resize,
            threshold: self.threshold,
            cache_mode: self.cache_mode,
            cache_file: self.cache_file.clone(),
            debug_dir: self.debug_dir.clone(),
            jobs: self.jobs,
        }
    }
}

/// Where input files come from.
#[derive(Debug, Clone, Default, Args)]
pub struct InputArgs {
    /// Also read newline-delimited paths from standard input
    #[arg(long)]
    pub stdin: bool,

    /// Expand directory arguments recursively
    #[arg(short = 'R', long)]
    pub recursive: bool,
}

/// Arguments for modes that take a file list.
#[derive(Debug, Args)]
pub struct FilesArgs {
    /// Image files or directories
    #[arg(value_name = "PATH", required_unless_present = "stdin")]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Arguments for `compare`.
#[derive(Debug, Args)]
pub struct CompareArgs {
    /// First image
    pub first: PathBuf,

    /// Second image
    pub second: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Arguments for `match`.
#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Image to match against
    pub target: PathBuf,

    /// Candidate files or directories
    #[arg(value_name = "PATH", required_unless_present = "stdin")]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Arguments for `test`.
#[derive(Debug, Args)]
pub struct TestArgs {
    /// Directories, each holding variants of one image
    #[arg(value_name = "DIR", required = true)]
    pub dirs: Vec<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Arguments for `config`.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl Commands {
    /// Options shared by every mode.
    #[must_use]
    pub fn common(&self) -> &CommonArgs {
        match self {
            Self::Fingerprint(args) | Self::FindDupes(args) | Self::FindDupesOneline(args) => {
                &args.common
            }
            Self::Compare(args) => &args.common,
            Self::Match(args) => &args.common,
            Self::Test(args) => &args.common,
            Self::Config(args) => &args.common,
        }
    }
}
