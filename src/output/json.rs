//! JSON output.
//!
//! # Output Schema
//!
//! Each report is one pretty-printed document:
//!
//! ```json
//! { "fingerprints": [ { "path": "a.png", "fingerprint": "0f3c" }, { "path": "b.png", "fingerprint": null } ] }
//! { "left": "a.png", "right": "b.png", "similarity": 87.5 }
//! { "matches": [ { "path": "b.png", "similarity": 93.1 } ] }
//! { "groups": [ { "index": 1, "paths": ["a1.png", "a2.png"] } ] }
//! { "directories": [ { "dir": "cats", "files": 3, "min_match": 96.2,
//!                      "max_mismatch": [ { "other": "dogs", "max_mismatch": 40.0 } ] } ] }
//! ```
//!
//! Unlike text output, failed files stay in the fingerprint list with a
//! `null` fingerprint.

use std::io::Write;

use serde::Serialize;

use super::Report;
use crate::batch::DirectoryReport;
use crate::compare::{MatchResult, PairSimilarity};
use crate::duplicates::DupeGroup;
use crate::fetch::FileFingerprint;

#[derive(Serialize)]
#[serde(untagged)]
enum JsonDocument<'a> {
    Fingerprints { fingerprints: &'a [FileFingerprint] },
    Similarity(&'a PairSimilarity),
    Matches { matches: &'a [MatchResult] },
    Dupes { groups: &'a [DupeGroup] },
    Batch { directories: &'a [DirectoryReport] },
}

/// JSON formatter for a [`Report`].
pub struct JsonOutput<'a> {
    report: Report<'a>,
}

impl<'a> JsonOutput<'a> {
    /// Wrap a report.
    #[must_use]
    pub fn new(report: Report<'a>) -> Self {
        Self { report }
    }

    fn document(&self) -> JsonDocument<'a> {
        match self.report {
            Report::Fingerprints(fingerprints) => JsonDocument::Fingerprints { fingerprints },
            Report::Similarity(pair) => JsonDocument::Similarity(pair),
            Report::Matches(matches) => JsonDocument::Matches { matches },
            Report::Dupes { groups, .. } => JsonDocument::Dupes { groups },
            Report::Batch(directories) => JsonDocument::Batch { directories },
        }
    }

    /// Serialize to a pretty-printed string.
    ///
    /// # Errors
    ///
    /// Returns [`JsonOutputError`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, JsonOutputError> {
        Ok(serde_json::to_string_pretty(&self.document())?)
    }

    /// Write the document followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns [`JsonOutputError`] if serialization or writing fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), JsonOutputError> {
        serde_json::to_writer_pretty(&mut writer, &self.document())?;
        writeln!(writer)?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
