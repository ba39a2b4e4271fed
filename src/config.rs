//! Run configuration.
//!
//! Settings are layered with [`figment`], lowest priority first:
//!
//! 1. Built-in defaults ([`Settings::default`])
//! 2. TOML config file (`--config PATH`, or `config.toml` in the platform config dir)
//! 3. `IMGPRINT_*` environment variables
//! 4. Command-line flags ([`SettingsOverrides`])
//!
//! The extracted [`Settings`] are validated once and are immutable for the run.
//! The fingerprint-shaping fields (colorspace, size, square mode, quick resize)
//! also determine the identity of the automatic cache file.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "IMGPRINT_";

/// Bit depth and channel layout of a fingerprint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Colorspace {
    /// 1 bit per pixel, thresholded
    #[default]
    Mono1,
    /// 4 bits per pixel, 16 gray levels
    Gray4,
    /// 12 bits per pixel, 4 bits per RGB channel
    Rgb12,
}

impl Colorspace {
    /// Number of hex characters in a fingerprint of side `size`.
    #[must_use]
    pub fn fingerprint_len(self, size: u32) -> usize {
        let pixels = size as usize * size as usize;
        match self {
            Self::Mono1 => pixels.div_ceil(4),
            Self::Gray4 => pixels,
            Self::Rgb12 => pixels * 3,
        }
    }
}

impl fmt::Display for Colorspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mono1 => write!(f, "mono1"),
            Self::Gray4 => write!(f, "gray4"),
            Self::Rgb12 => write!(f, "rgb12"),
        }
    }
}

/// Aspect-ratio handling before the final resample.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum SquareMode {
    /// Add a black border to the shorter side
    #[default]
    Pad,
    /// Distort the image into a square
    Stretch,
}

impl fmt::Display for SquareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pad => write!(f, "pad"),
            Self::Stretch => write!(f, "stretch"),
        }
    }
}

/// How the fingerprint cache is used.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Never load or store; always recompute
    Disabled,
    /// Load and look up, never append
    ReadOnly,
    /// Load, look up, and append on miss
    #[default]
    ReadWrite,
}

impl CacheMode {
    /// Whether the cache file is read at all.
    #[must_use]
    pub fn reads(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Whether new fingerprints are appended.
    #[must_use]
    pub fn writes(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::ReadOnly => write!(f, "read-only"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// Configuration errors. Always fatal: they abort the run before any file
/// is fingerprinted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be read or a value could not be parsed
    /// (unknown colorspace, non-numeric size, ...).
    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// Square size must be at least 1.
    #[error("Square size must be a positive integer, got {0}")]
    InvalidSize(u32),

    /// Threshold must be a finite percentage.
    #[error("Threshold must be between 0 and 100, got {0}")]
    InvalidThreshold(f64),

    /// Explicit config file does not exist.
    #[error("Config file not found: {0}")]
    MissingConfigFile(PathBuf),

    /// No platform cache directory and no explicit cache file.
    #[error("Could not determine a cache directory; pass --cache-file or --cache-mode disabled")]
    NoCacheDir,
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Fingerprint colorspace.
    pub colorspace: Colorspace,
    /// Side length of the square the image is reduced to.
    pub size: u32,
    /// Aspect-ratio policy.
    pub square_mode: SquareMode,
    /// Pre-blur downscale dimension, 0 disables.
    pub quick_resize: u32,
    /// Minimum similarity percentage for a match.
    pub threshold: f64,
    /// Cache usage.
    pub cache_mode: CacheMode,
    /// Explicit cache file. Disables automatic keying by configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    /// Directory for debug bitmap exports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_dir: Option<PathBuf>,
    /// Number of fingerprinting workers.
    pub jobs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            colorspace: Colorspace::Mono1,
            size: 16,
            square_mode: SquareMode::Pad,
            quick_resize: 0,
            threshold: 90.0,
            cache_mode: CacheMode::ReadWrite,
            cache_file: None,
            debug_dir: None,
            jobs: 4,
        }
    }
}

/// Values supplied on the command line. Only `Some` fields override lower layers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsOverrides {
    /// Fingerprint colorspace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorspace: Option<Colorspace>,
    /// Side length of the fingerprint grid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    /// Pad or stretch non-square images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_mode: Option<SquareMode>,
    /// Pre-shrink bound in pixels, 0 to disable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_resize: Option<u32>,
    /// Minimum similarity percentage for a match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// How the fingerprint cache is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_mode: Option<CacheMode>,
    /// Cache file in place of the keyed default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    /// Directory for intermediate BMP dumps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_dir: Option<PathBuf>,
    /// Worker threads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl Settings {
    /// Load settings from all layers and validate them.
    ///
    /// An explicit `config_file` must exist; the default config file is
    /// optional.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any layer fails to parse or the result is
    /// out of range.
    pub fn load(
        config_file: Option<&Path>,
        overrides: &SettingsOverrides,
    ) -> Result<Self, ConfigError> {
        let file = match config_file {
            Some(path) if !path.exists() => {
                return Err(ConfigError::MissingConfigFile(path.to_path_buf()))
            }
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = &file {
            log::debug!("Reading config file {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        let figment = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(overrides));

        Self::from_figment(&figment)
    }

    /// Extract and validate settings from a prepared figment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on extraction or validation failure.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let settings: Settings = figment.extract().map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range field as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::InvalidSize(self.size));
        }
        if !self.threshold.is_finite() || !(0.0..=100.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }

    /// Number of hex characters every fingerprint of this run has.
    #[must_use]
    pub fn fingerprint_len(&self) -> usize {
        self.colorspace.fingerprint_len(self.size)
    }

    /// Cache file name keyed by every setting that shapes a fingerprint.
    #[must_use]
    pub fn cache_file_name(&self) -> String {
        format!(
            "imgprint-{}-{}-{}-q{}.cache",
            self.colorspace, self.size, self.square_mode, self.quick_resize
        )
    }

    /// Where the cache lives for this run, or `None` when caching is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoCacheDir`] when no override is given and the
    /// platform cache directory cannot be determined.
    pub fn cache_location(&self) -> Result<Option<PathBuf>, ConfigError> {
        if !self.cache_mode.reads() {
            return Ok(None);
        }
        if let Some(path) = &self.cache_file {
            return Ok(Some(path.clone()));
        }
        let dirs = project_dirs().ok_or(ConfigError::NoCacheDir)?;
        Ok(Some(dirs.cache_dir().join(self.cache_file_name())))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "imgprint", "imgprint")
}

/// Default config file location, if the platform has a config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}
