//! Transform pipeline: image file to [`Fingerprint`].
//!
//! # Steps
//!
//! 1. **Quick resize** (when configured): fit into `Q x Q` to bound blur cost
//! 2. **Blur**: radius `max(3, round(1.5% of the longer side))`, sigma 60
//! 3. **Normalize**: 2% black point, 1% white point
//! 4. **Equalize**
//! 5. **Aspect**: pad mode adds a symmetric black border to the shorter side
//! 6. **Resample**: point-sample to exactly `S x S`
//! 7. **Quantize**: mono1 thresholds at 50% then keeps 2 grays, gray4 keeps 16
//!    grays, rgb12 keeps 4096 colors
//!
//! Pixels are then read row-major and packed into hex by [`BitPacker`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::backend::{BackendError, ImageBackend, QuantizeSpace, RasterBackend, Sampling};
use super::{BitPacker, Fingerprint, ImageProcessingError};
use crate::config::{Colorspace, Settings, SquareMode};

/// Blur sigma. Much larger than any radius the pipeline uses, so the kernel is
/// close to a box filter.
pub const BLUR_SIGMA: f64 = 60.0;
/// Smallest blur radius.
pub const MIN_BLUR_RADIUS: u32 = 3;
/// Mono threshold, percent of intensity range.
pub const MONO_THRESHOLD_PERCENT: f64 = 50.0;

/// Divisor that rescales a 16-bit channel to 4 bits.
const NIBBLE_SCALE: u16 = 4096;

/// Fingerprint-shaping parameters of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Output colorspace
    pub colorspace: Colorspace,
    /// Side of the final square
    pub size: u32,
    /// Aspect policy
    pub square_mode: SquareMode,
    /// Pre-blur resize, 0 disables
    pub quick_resize: u32,
    /// Where to drop debug bitmaps
    pub debug_dir: Option<PathBuf>,
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            colorspace: settings.colorspace,
            size: settings.size,
            square_mode: settings.square_mode,
            quick_resize: settings.quick_resize,
            debug_dir: settings.debug_dir.clone(),
        }
    }
}

/// Runs the transform steps for one file at a time.
///
/// The pipeline holds no image state between calls; each [`Pipeline::compute`]
/// loads, transforms and drops its own image.
#[derive(Debug, Clone)]
pub struct Pipeline<B = RasterBackend> {
    backend: B,
    config: PipelineConfig,
}

impl Pipeline<RasterBackend> {
    /// Pipeline on the default raster backend.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_backend(RasterBackend::new(), config)
    }
}

impl<B: ImageBackend> Pipeline<B> {
    /// Pipeline on a custom backend.
    #[must_use]
    pub fn with_backend(backend: B, config: PipelineConfig) -> Self {
        Self { backend, config }
    }

    /// Parameters this pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Compute the fingerprint of the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageProcessingError::Step`] naming the first step that
    /// failed.
    pub fn compute(&self, path: &Path) -> Result<Fingerprint, ImageProcessingError> {
        let fail = |step: &'static str| {
            move |source: BackendError| ImageProcessingError::Step {
                path: path.to_path_buf(),
                step,
                source,
            }
        };
        let backend = &self.backend;
        let cfg = &self.config;

        let mut image = backend.load(path).map_err(fail("load"))?;

        if cfg.quick_resize > 0 {
            image = backend
                .resample(image, cfg.quick_resize, cfg.quick_resize, Sampling::Uniform)
                .map_err(fail("quick-resize"))?;
        }

        let (w, h) = backend.dimensions(&image);
        let radius = blur_radius(w, h);
        log::trace!("{}: {}x{} blur radius {}", path.display(), w, h, radius);
        image = backend
            .blur(image, radius, BLUR_SIGMA)
            .map_err(fail("blur"))?;
        image = backend.normalize(image).map_err(fail("normalize"))?;
        image = backend.equalize(image).map_err(fail("equalize"))?;

        if cfg.square_mode == SquareMode::Pad {
            let (bw, bh) = pad_border(w, h);
            image = backend
                .add_border(image, bw, bh)
                .map_err(fail("pad"))?;
        }

        // Forced even in pad mode: truncating an odd difference can leave the
        // padded image one pixel short of square.
        image = backend
            .resample(image, cfg.size, cfg.size, Sampling::Stretch)
            .map_err(fail("resample"))?;

        image = match cfg.colorspace {
            Colorspace::Mono1 => {
                let binary = backend
                    .threshold(image, MONO_THRESHOLD_PERCENT)
                    .map_err(fail("threshold"))?;
                backend.quantize(binary, 2, QuantizeSpace::Gray)
            }
            Colorspace::Gray4 => backend.quantize(image, 16, QuantizeSpace::Gray),
            Colorspace::Rgb12 => backend.quantize(image, 4096, QuantizeSpace::Rgb),
        }
        .map_err(fail("quantize"))?;

        if let Some(dir) = &cfg.debug_dir {
            self.export_debug(&image, dir, path);
        }

        Fingerprint::from_hex(self.extract(&image)).map_err(|source| {
            ImageProcessingError::Encode {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Read pixels row-major and pack them into hex.
    fn extract(&self, image: &B::Image) -> String {
        let (w, h) = self.backend.dimensions(image);
        let colorspace = self.config.colorspace;
        let mut packer = BitPacker::with_capacity(colorspace.fingerprint_len(w.max(h)));
        for y in 0..h {
            for x in 0..w {
                let [r, g, b] = self.backend.pixel(image, x, y);
                match colorspace {
                    Colorspace::Mono1 => packer.push_bit(r > 0),
                    Colorspace::Gray4 => packer.push_nibble((r / NIBBLE_SCALE) as u8),
                    Colorspace::Rgb12 => {
                        for v in [r, g, b] {
                            packer.push_nibble((v / NIBBLE_SCALE) as u8);
                        }
                    }
                }
            }
        }
        packer.finish()
    }

    fn export_debug(&self, image: &B::Image, dir: &Path, source: &Path) {
        let target = dir.join(debug_file_name(Utc::now().timestamp_millis(), source));
        let written = self
            .backend
            .export_bmp(image)
            .map_err(|e| e.to_string())
            .and_then(|bytes| fs::write(&target, bytes).map_err(|e| e.to_string()));
        match written {
            Ok(()) => log::debug!("Wrote debug bitmap {}", target.display()),
            Err(e) => log::warn!("Failed to write debug bitmap {}: {}", target.display(), e),
        }
    }
}

/// Blur radius for an image of the given size.
#[must_use]
pub fn blur_radius(width: u32, height: u32) -> u32 {
    let longer = f64::from(width.max(height));
    ((longer * 0.015).round() as u32).max(MIN_BLUR_RADIUS)
}

/// Border (left/right width, top/bottom height) that squares the image.
#[must_use]
pub fn pad_border(width: u32, height: u32) -> (u32, u32) {
    if width >= height {
        (0, (width - height) / 2)
    } else {
        ((height - width) / 2, 0)
    }
}

/// `<timestamp-ms>_<sanitized-path>.bmp`
#[must_use]
pub fn debug_file_name(timestamp_ms: i64, source: &Path) -> String {
    let sanitized: String = source
        .to_string_lossy()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_ascii_alphanumeric() => c,
            _ => '-',
        })
        .collect();
    format!("{timestamp_ms}_{sanitized}.bmp")
}
