//! Greedy near-duplicate clustering.
//!
//! Files are visited in input order. Each unclaimed file with a fingerprint
//! becomes a source and claims every later unclaimed file whose similarity to
//! it reaches the threshold. Claims are never revisited, so the result depends
//! on input order and is not transitive: if A~B and B~C but not A~C, C stays
//! free to start or join a later group.

use crate::compare::{similarity, CompareError};
use crate::config::Colorspace;
use crate::fetch::FileFingerprint;

use super::groups::{DedupStats, DupeGroup};

/// Cluster `files` into groups of similar images.
///
/// Only groups with at least one match are returned, ordered by source
/// position.
///
/// # Errors
///
/// Returns [`CompareError`] if two fingerprints have different lengths.
///
/// # Example
///
/// ```
/// use imgprint::config::Colorspace;
/// use imgprint::duplicates::find_dupes;
/// use imgprint::fetch::FileFingerprint;
/// use imgprint::fingerprint::Fingerprint;
///
/// let file = |path: &str, hex: &str| FileFingerprint {
///     path: path.into(),
///     fingerprint: Some(Fingerprint::from_hex(hex).unwrap()),
/// };
/// let files = [file("a1", "ff"), file("b1", "00"), file("a2", "ff")];
/// let groups = find_dupes(&files, 90.0, Colorspace::Mono1).unwrap();
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].index, 1);
/// assert_eq!(groups[0].paths, vec![std::path::PathBuf::from("a1"), "a2".into()]);
/// ```
pub fn find_dupes(
    files: &[FileFingerprint],
    threshold: f64,
    colorspace: Colorspace,
) -> Result<Vec<DupeGroup>, CompareError> {
    let mut claimed = vec![false; files.len()];
    let mut groups = Vec::new();

    for (i, source) in files.iter().enumerate() {
        if claimed[i] {
            continue;
        }
        let Some(source_fp) = &source.fingerprint else {
            continue;
        };

        let mut group = DupeGroup::new(i + 1, source.path.clone());
        for (j, candidate) in files.iter().enumerate().skip(i + 1) {
            if claimed[j] {
                continue;
            }
            let Some(candidate_fp) = &candidate.fingerprint else {
                continue;
            };
            let pct = similarity(Some(source_fp), Some(candidate_fp), colorspace)?;
            if pct >= threshold {
                log::trace!(
                    "{} ~ {} ({pct:.2}%)",
                    source.path.display(),
                    candidate.path.display()
                );
                group.push(candidate.path.clone());
                claimed[j] = true;
            }
        }

        if group.has_matches() {
            claimed[i] = true;
            groups.push(group);
        }
    }

    let unfingerprinted = files.iter().filter(|f| f.fingerprint.is_none()).count();
    let stats = DedupStats::from_groups(files.len(), unfingerprinted, &groups);
    log::debug!(
        "Dedup: {} groups covering {} of {} files",
        stats.groups,
        stats.grouped_files,
        stats.total_files
    );
    Ok(groups)
}
