//! Plain text rendering.
//!
//! | report | line format |
//! |---|---|
//! | fingerprints | `<hex> <path>`, failed files omitted |
//! | similarity | `<pct>` |
//! | matches | `<pct> <path>` |
//! | dupes | `<index>:<path>` per file |
//! | dupes, oneline | paths of one group joined by spaces |
//! | batch | directory header, then `MIN_MATCH_PCT` and `MAX_MISMATCH_PCT` lines |
//!
//! Percentages have two decimals; a missing batch value prints as `n/a`.

use std::io::{self, Write};

use super::Report;
use crate::batch::DirectoryReport;
use crate::duplicates::DupeGroup;

/// Write `report` as text lines.
///
/// # Errors
///
/// Returns any error from `writer`.
pub fn write_report<W: Write>(report: &Report<'_>, writer: &mut W) -> io::Result<()> {
    match *report {
        Report::Fingerprints(files) => {
            for file in files {
                if let Some(fp) = &file.fingerprint {
                    writeln!(writer, "{} {}", fp, file.path.display())?;
                }
            }
        }
        Report::Similarity(pair) => writeln!(writer, "{:.2}", pair.similarity)?,
        Report::Matches(matches) => {
            for m in matches {
                writeln!(writer, "{:.2} {}", m.similarity, m.path.display())?;
            }
        }
        Report::Dupes { groups, oneline } => write_dupes(groups, oneline, writer)?,
        Report::Batch(reports) => {
            for report in reports {
                write_directory(report, writer)?;
            }
        }
    }
    Ok(())
}

fn write_dupes<W: Write>(groups: &[DupeGroup], oneline: bool, writer: &mut W) -> io::Result<()> {
    for group in groups {
        if oneline {
            let joined: Vec<String> = group
                .paths
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            writeln!(writer, "{}", joined.join(" "))?;
        } else {
            for path in &group.paths {
                writeln!(writer, "{}:{}", group.index, path.display())?;
            }
        }
    }
    Ok(())
}

fn write_directory<W: Write>(report: &DirectoryReport, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{}", report.dir.display())?;
    writeln!(writer, "  MIN_MATCH_PCT: {}", pct(report.min_match))?;
    for cross in &report.max_mismatch {
        writeln!(
            writer,
            "  MAX_MISMATCH_PCT {}: {}",
            cross.other.display(),
            pct(cross.max_mismatch)
        )?;
    }
    Ok(())
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}
