//! Perceptual image fingerprints.
//!
//! A fingerprint is the lowercase hex encoding of an image reduced to a tiny
//! square of quantized pixels. The reduction is performed by
//! [`pipeline::Pipeline`] through an [`backend::ImageBackend`]; this module
//! holds the value type and the bit packing.
//!
//! # Architecture
//!
//! * [`backend`]: pixel operations (load, blur, normalize, ...) behind a trait,
//!   with the `image`-crate implementation [`backend::RasterBackend`].
//! * [`pipeline`]: the ordered transform steps and pixel extraction.
//!
//! # Length law
//!
//! For a square side `S`: mono1 produces `ceil(S²/4)` hex characters, gray4
//! produces `S²`, rgb12 produces `3·S²`.

pub mod backend;
pub mod pipeline;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use backend::{BackendError, ImageBackend, QuantizeSpace, RasterBackend, Sampling};
pub use pipeline::Pipeline;

/// Rejected fingerprint text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FingerprintError {
    /// Empty strings are never produced by the pipeline.
    #[error("Fingerprint is empty")]
    Empty,
    /// Only `0-9a-f` are allowed.
    #[error("Invalid fingerprint character {ch:?} at offset {offset}")]
    InvalidChar {
        /// The offending character
        ch: char,
        /// Byte offset in the input
        offset: usize,
    },
}

/// Failure to fingerprint one file. Recoverable: the file is reported with no
/// fingerprint and the run continues.
#[derive(Debug, Error)]
pub enum ImageProcessingError {
    /// A pipeline step failed.
    #[error("Failed to {step} {path}: {source}")]
    Step {
        /// Source image path
        path: PathBuf,
        /// Step that failed
        step: &'static str,
        /// Backend error
        #[source]
        source: BackendError,
    },

    /// Extraction produced no usable hex.
    #[error("Failed to encode fingerprint for {path}: {source}")]
    Encode {
        /// Source image path
        path: PathBuf,
        /// Validation failure
        #[source]
        source: FingerprintError,
    },

    /// The file could not be stat'ed.
    #[error("Cannot read metadata for {path}: {source}")]
    Metadata {
        /// Source image path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Lowercase hex digest of an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Validate and wrap a hex string.
    ///
    /// # Errors
    ///
    /// Returns [`FingerprintError`] for empty input or any character outside
    /// `0-9a-f`.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, FingerprintError> {
        let hex = hex.into();
        if hex.is_empty() {
            return Err(FingerprintError::Empty);
        }
        if let Some((offset, ch)) = hex
            .char_indices()
            .find(|(_, c)| !matches!(c, '0'..='9' | 'a'..='f'))
        {
            return Err(FingerprintError::InvalidChar { ch, offset });
        }
        Ok(Self(hex))
    }

    /// The hex text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of hex characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a validated fingerprint.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nibble values (0-15) in order.
    pub fn nibbles(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(nibble_value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

/// Value of a lowercase hex digit. Callers only pass validated bytes.
#[inline]
pub(crate) const fn nibble_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => 0,
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Packs a bit stream into hex, most significant bit of each nibble first.
#[derive(Debug, Default)]
pub struct BitPacker {
    hex: String,
    acc: u8,
    filled: u8,
}

impl BitPacker {
    /// Create a packer expecting roughly `nibbles` output characters.
    #[must_use]
    pub fn with_capacity(nibbles: usize) -> Self {
        Self {
            hex: String::with_capacity(nibbles),
            acc: 0,
            filled: 0,
        }
    }

    /// Append one bit.
    pub fn push_bit(&mut self, bit: bool) {
        self.acc = (self.acc << 1) | u8::from(bit);
        self.filled += 1;
        if self.filled == 4 {
            self.flush();
        }
    }

    /// Append a 4-bit group (only the low 4 bits of `value` are used).
    pub fn push_nibble(&mut self, value: u8) {
        if self.filled == 0 {
            self.acc = value & 0x0f;
            self.flush();
        } else {
            for shift in (0..4).rev() {
                self.push_bit((value >> shift) & 1 == 1);
            }
        }
    }

    fn flush(&mut self) {
        self.hex.push(char::from(HEX_DIGITS[usize::from(self.acc)]));
        self.acc = 0;
        self.filled = 0;
    }

    /// Right-pad the trailing partial nibble with zero bits and return the hex.
    #[must_use]
    pub fn finish(mut self) -> String {
        if self.filled > 0 {
            self.acc <<= 4 - self.filled;
            self.flush();
        }
        self.hex
    }
}
