//! Similarity between two fingerprints.
//!
//! mono1 fingerprints are compared bitwise (Hamming distance); gray4 and rgb12
//! fingerprints are compared per 4-bit sample (sum of absolute differences).
//! Both map onto `100 * (1 - distance / max_distance)`.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::config::Colorspace;
use crate::fetch::FileFingerprint;
use crate::fingerprint::{nibble_value, Fingerprint};

/// Hex characters per Hamming chunk (64 bits).
const CHUNK_CHARS: usize = 16;

/// Largest per-sample difference for 4-bit channels.
const MAX_SAMPLE_DIFF: u64 = 15;

/// Fingerprints that cannot be compared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompareError {
    /// Lengths differ, which means the fingerprints came from different
    /// configurations.
    #[error("Fingerprint lengths differ ({left} vs {right}); were they made with the same settings?")]
    LengthMismatch {
        /// Length of the first fingerprint
        left: usize,
        /// Length of the second fingerprint
        right: usize,
    },
}

/// Similarity percentage in `[0, 100]`.
///
/// A missing fingerprint on either side yields 0.
///
/// # Errors
///
/// Returns [`CompareError::LengthMismatch`] when both are present but differ
/// in length.
///
/// # Example
///
/// ```
/// use imgprint::compare::similarity;
/// use imgprint::config::Colorspace;
/// use imgprint::fingerprint::Fingerprint;
///
/// let white = Fingerprint::from_hex("fff").unwrap();
/// let black = Fingerprint::from_hex("000").unwrap();
/// assert_eq!(similarity(Some(&white), Some(&black), Colorspace::Rgb12).unwrap(), 0.0);
/// assert_eq!(similarity(Some(&white), Some(&white), Colorspace::Rgb12).unwrap(), 100.0);
/// assert_eq!(similarity(None, Some(&white), Colorspace::Rgb12).unwrap(), 0.0);
/// ```
pub fn similarity(
    a: Option<&Fingerprint>,
    b: Option<&Fingerprint>,
    colorspace: Colorspace,
) -> Result<f64, CompareError> {
    let (Some(a), Some(b)) = (a, b) else {
        return Ok(0.0);
    };
    if a.len() != b.len() {
        return Err(CompareError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let (diff, max_diff) = match colorspace {
        Colorspace::Mono1 => (hamming_distance(a, b), a.len() as u64 * 4),
        Colorspace::Gray4 | Colorspace::Rgb12 => {
            (channel_distance(a, b), a.len() as u64 * MAX_SAMPLE_DIFF)
        }
    };
    if max_diff == 0 {
        return Ok(100.0);
    }
    Ok(100.0 * (1.0 - diff as f64 / max_diff as f64))
}

/// Number of differing bits between two equal-length fingerprints.
#[must_use]
pub fn hamming_distance(a: &Fingerprint, b: &Fingerprint) -> u64 {
    a.as_str()
        .as_bytes()
        .chunks(CHUNK_CHARS)
        .zip(b.as_str().as_bytes().chunks(CHUNK_CHARS))
        .map(|(x, y)| u64::from((pack_chunk(x) ^ pack_chunk(y)).count_ones()))
        .sum()
}

/// Sum of absolute per-nibble differences between two equal-length fingerprints.
#[must_use]
pub fn channel_distance(a: &Fingerprint, b: &Fingerprint) -> u64 {
    a.nibbles()
        .zip(b.nibbles())
        .map(|(x, y)| u64::from(x.abs_diff(y)))
        .sum()
}

/// Similarity between two specific files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairSimilarity {
    /// First file
    pub left: PathBuf,
    /// Second file
    pub right: PathBuf,
    /// Similarity percentage
    pub similarity: f64,
}

impl PairSimilarity {
    /// Compare two fetched files.
    ///
    /// # Errors
    ///
    /// Returns [`CompareError`] if both have fingerprints of different lengths.
    pub fn between(
        left: &FileFingerprint,
        right: &FileFingerprint,
        colorspace: Colorspace,
    ) -> Result<Self, CompareError> {
        Ok(Self {
            left: left.path.clone(),
            right: right.path.clone(),
            similarity: similarity(
                left.fingerprint.as_ref(),
                right.fingerprint.as_ref(),
                colorspace,
            )?,
        })
    }
}

/// A file that reached the threshold against a target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Matching file
    pub path: PathBuf,
    /// Its similarity to the target
    pub similarity: f64,
}

/// Files in `candidates` at least `threshold` percent similar to `target`,
/// in candidate order.
///
/// # Errors
///
/// Returns [`CompareError`] on a fingerprint length mismatch.
pub fn find_matches(
    target: &FileFingerprint,
    candidates: &[FileFingerprint],
    threshold: f64,
    colorspace: Colorspace,
) -> Result<Vec<MatchResult>, CompareError> {
    let mut matches = Vec::new();
    for candidate in candidates {
        let pct = similarity(
            target.fingerprint.as_ref(),
            candidate.fingerprint.as_ref(),
            colorspace,
        )?;
        if pct >= threshold {
            matches.push(MatchResult {
                path: candidate.path.clone(),
                similarity: pct,
            });
        }
    }
    Ok(matches)
}

/// Up to 16 hex characters as one integer.
fn pack_chunk(chunk: &[u8]) -> u64 {
    chunk
        .iter()
        .fold(0u64, |acc, &c| (acc << 4) | u64::from(nibble_value(c)))
}
