//! Result rendering.
//!
//! Every command produces a [`Report`]; [`render`] writes it in the selected
//! [`OutputFormat`]:
//! - text, one result per line
//! - JSON for automation
//! - CSV for spreadsheets
//!
//! # Example
//!
//! ```
//! use imgprint::compare::PairSimilarity;
//! use imgprint::output::{render, OutputFormat, Report};
//!
//! let pair = PairSimilarity {
//!     left: "a.png".into(),
//!     right: "b.png".into(),
//!     similarity: 87.5,
//! };
//! let mut out = Vec::new();
//! render(&Report::Similarity(&pair), OutputFormat::Text, &mut out).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "87.50\n");
//! ```

pub mod csv;
pub mod json;
pub mod text;

use std::io::{self, Write};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::DirectoryReport;
use crate::compare::{MatchResult, PairSimilarity};
use crate::duplicates::DupeGroup;
use crate::fetch::FileFingerprint;

pub use self::csv::{CsvOutput, CsvOutputError};
pub use self::json::{JsonOutput, JsonOutputError};

/// Output format for results on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text lines
    #[default]
    Text,
    /// A single JSON document
    Json,
    /// CSV with a header row
    Csv,
}

/// Result of one command.
#[derive(Debug, Clone, Copy)]
pub enum Report<'a> {
    /// `fingerprint`
    Fingerprints(&'a [FileFingerprint]),
    /// `compare`
    Similarity(&'a PairSimilarity),
    /// `match`
    Matches(&'a [MatchResult]),
    /// `find-dupes` and `find-dupes-oneline`
    Dupes {
        /// Groups in source order
        groups: &'a [DupeGroup],
        /// One line per group instead of one line per file
        oneline: bool,
    },
    /// `test`
    Batch(&'a [DirectoryReport]),
}

/// Any rendering failure.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Writing text failed.
    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),

    /// JSON rendering failed.
    #[error(transparent)]
    Json(#[from] JsonOutputError),

    /// CSV rendering failed.
    #[error(transparent)]
    Csv(#[from] CsvOutputError),
}

/// Write `report` to `writer` in `format`.
///
/// # Errors
///
/// Returns [`OutputError`] if serialization or writing fails.
pub fn render<W: Write>(
    report: &Report<'_>,
    format: OutputFormat,
    mut writer: W,
) -> Result<(), OutputError> {
    match format {
        OutputFormat::Text => text::write_report(report, &mut writer)?,
        OutputFormat::Json => JsonOutput::new(*report).write_to(&mut writer)?,
        OutputFormat::Csv => CsvOutput::new(*report).write_to(&mut writer)?,
    }
    writer.flush()?;
    Ok(())
}
