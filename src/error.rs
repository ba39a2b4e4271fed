//! Exit codes and structured error reporting.

use serde::Serialize;

use crate::cache::CacheError;
use crate::compare::CompareError;
use crate::config::ConfigError;

/// Process exit codes for imgprint.
///
/// - 0: Success (including runs where some files could not be fingerprinted)
/// - 1: General error (unexpected failure, mismatched fingerprints)
/// - 2: Configuration error
/// - 3: Cache error (malformed, unreadable or unwritable cache file)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed normally.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Configuration was rejected before processing started.
    ConfigError = 2,
    /// The fingerprint cache could not be used.
    CacheError = 3,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "IP000",
            Self::GeneralError => "IP001",
            Self::ConfigError => "IP002",
            Self::CacheError => "IP003",
        }
    }

    /// Classify a fatal error by walking its chain.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if cause.is::<ConfigError>() {
                return Self::ConfigError;
            }
            if cause.is::<CacheError>() {
                return Self::CacheError;
            }
            if cause.is::<CompareError>() {
                return Self::GeneralError;
            }
        }
        Self::GeneralError
    }
}

/// Structured error information for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "IP002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message including causes
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
        }
    }
}
