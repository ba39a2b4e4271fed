//! CSV output.
//!
//! One header row, then one row per item:
//!
//! - fingerprints: `path,fingerprint` (empty fingerprint for failed files)
//! - similarity: `left,right,similarity`
//! - matches: `path,similarity`
//! - dupes: `group,path`, one row per member
//! - batch: `dir,metric,other,value`, one `min_match` row per directory and
//!   one `max_mismatch` row per other directory; missing values are empty

use std::io;

use serde::Serialize;
use thiserror::Error;

use super::Report;

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Serialize)]
struct FingerprintRow {
    path: String,
    fingerprint: String,
}

#[derive(Serialize)]
struct PairRow {
    left: String,
    right: String,
    similarity: String,
}

#[derive(Serialize)]
struct MatchRow {
    path: String,
    similarity: String,
}

#[derive(Serialize)]
struct GroupRow {
    group: usize,
    path: String,
}

#[derive(Serialize)]
struct BatchRow {
    dir: String,
    metric: &'static str,
    other: String,
    value: String,
}

/// CSV formatter for a [`Report`].
pub struct CsvOutput<'a> {
    report: Report<'a>,
}

impl<'a> CsvOutput<'a> {
    /// Wrap a report.
    #[must_use]
    pub fn new(report: Report<'a>) -> Self {
        Self { report }
    }

    /// Write the rows to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        // Headers are written explicitly so empty reports still get one.
        let mut out = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        match self.report {
            Report::Fingerprints(files) => {
                out.write_record(["path", "fingerprint"])?;
                for file in files {
                    out.serialize(FingerprintRow {
                        path: file.path.to_string_lossy().into_owned(),
                        fingerprint: file
                            .fingerprint
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_default(),
                    })?;
                }
            }
            Report::Similarity(pair) => {
                out.write_record(["left", "right", "similarity"])?;
                out.serialize(PairRow {
                    left: pair.left.to_string_lossy().into_owned(),
                    right: pair.right.to_string_lossy().into_owned(),
                    similarity: format!("{:.2}", pair.similarity),
                })?;
            }
            Report::Matches(matches) => {
                out.write_record(["path", "similarity"])?;
                for m in matches {
                    out.serialize(MatchRow {
                        path: m.path.to_string_lossy().into_owned(),
                        similarity: format!("{:.2}", m.similarity),
                    })?;
                }
            }
            Report::Dupes { groups, .. } => {
                out.write_record(["group", "path"])?;
                for group in groups {
                    for path in &group.paths {
                        out.serialize(GroupRow {
                            group: group.index,
                            path: path.to_string_lossy().into_owned(),
                        })?;
                    }
                }
            }
            Report::Batch(reports) => {
                out.write_record(["dir", "metric", "other", "value"])?;
                for report in reports {
                    let dir = report.dir.to_string_lossy().into_owned();
                    out.serialize(BatchRow {
                        dir: dir.clone(),
                        metric: "min_match",
                        other: String::new(),
                        value: pct(report.min_match),
                    })?;
                    for cross in &report.max_mismatch {
                        out.serialize(BatchRow {
                            dir: dir.clone(),
                            metric: "max_mismatch",
                            other: cross.other.to_string_lossy().into_owned(),
                            value: pct(cross.max_mismatch),
                        })?;
                    }
                }
            }
        }

        out.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn pct(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}
