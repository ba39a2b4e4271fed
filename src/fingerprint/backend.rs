//! Pixel operations used by the fingerprint pipeline.
//!
//! [`ImageBackend`] is the seam between the pipeline's step ordering and the
//! actual pixel work. [`RasterBackend`] implements it on 16-bit RGB buffers
//! from the `image` crate, so every channel is read on a 0-65535 scale no
//! matter what the source bit depth was.
//!
//! Every operation consumes the image and returns the transformed one; a
//! pipeline run owns exactly one image value from load to extraction.

use std::io::{self, Cursor};
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, ImageFormat, ImageReader, Rgb};
use rayon::prelude::*;
use thiserror::Error;

/// 16 bits per channel RGB working image.
pub type Rgb16Image = ImageBuffer<Rgb<u16>, Vec<u16>>;

const MAX_CHANNEL: u16 = u16::MAX;
const LEVELS: usize = 1 << 16;

/// Errors raised by backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The file could not be opened or sniffed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Decoding or encoding failed (corrupt data, unsupported format).
    #[error("{0}")]
    Image(#[from] image::ImageError),

    /// Decoded image has zero width or height.
    #[error("Image has no pixels")]
    Empty,

    /// Requested output dimensions are unusable.
    #[error("Invalid target size {width}x{height}")]
    InvalidSize {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// A raw pixel buffer did not match its dimensions.
    #[error("Pixel buffer does not match image dimensions")]
    Buffer,
}

/// How a resample maps source to target dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Fit inside the target box, preserving aspect ratio.
    Uniform,
    /// Produce exactly the target size, scaling each axis independently.
    Stretch,
}

/// Colorspace in which colors are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizeSpace {
    /// Collapse to luma, then to N gray levels.
    Gray,
    /// Reduce each RGB channel to the cube root of N levels.
    Rgb,
}

/// The image-processing capability the pipeline depends on.
pub trait ImageBackend: Send + Sync {
    /// Owned image value threaded through the pipeline.
    type Image;

    /// Decode an image file. The format is sniffed from content.
    fn load(&self, path: &Path) -> Result<Self::Image, BackendError>;

    /// Width and height in pixels.
    fn dimensions(&self, image: &Self::Image) -> (u32, u32);

    /// Nearest-neighbour resample.
    fn resample(
        &self,
        image: Self::Image,
        width: u32,
        height: u32,
        sampling: Sampling,
    ) -> Result<Self::Image, BackendError>;

    /// Gaussian blur with a kernel truncated at `radius`.
    fn blur(&self, image: Self::Image, radius: u32, sigma: f64)
        -> Result<Self::Image, BackendError>;

    /// Per-channel linear stretch clipping the darkest 2% and brightest 1%.
    fn normalize(&self, image: Self::Image) -> Result<Self::Image, BackendError>;

    /// Per-channel histogram equalization.
    fn equalize(&self, image: Self::Image) -> Result<Self::Image, BackendError>;

    /// Surround the image with a black border `width` wide on the left and
    /// right and `height` tall on the top and bottom.
    fn add_border(
        &self,
        image: Self::Image,
        width: u32,
        height: u32,
    ) -> Result<Self::Image, BackendError>;

    /// Binarize at `percent` of the intensity range.
    fn threshold(&self, image: Self::Image, percent: f64) -> Result<Self::Image, BackendError>;

    /// Reduce to `colors` colors in `space`.
    fn quantize(
        &self,
        image: Self::Image,
        colors: u32,
        space: QuantizeSpace,
    ) -> Result<Self::Image, BackendError>;

    /// Channel values of one pixel on a 0-65535 scale.
    fn pixel(&self, image: &Self::Image, x: u32, y: u32) -> [u16; 3];

    /// Encode the image as a BMP file.
    fn export_bmp(&self, image: &Self::Image) -> Result<Vec<u8>, BackendError>;
}

/// [`ImageBackend`] on top of the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterBackend;

impl RasterBackend {
    /// Create a new backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ImageBackend for RasterBackend {
    type Image = Rgb16Image;

    fn load(&self, path: &Path) -> Result<Rgb16Image, BackendError> {
        let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(BackendError::Empty);
        }
        Ok(decoded.into_rgb16())
    }

    fn dimensions(&self, image: &Rgb16Image) -> (u32, u32) {
        image.dimensions()
    }

    fn resample(
        &self,
        image: Rgb16Image,
        width: u32,
        height: u32,
        sampling: Sampling,
    ) -> Result<Rgb16Image, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::InvalidSize { width, height });
        }
        if (width, height) == image.dimensions() {
            return Ok(image);
        }
        Ok(match sampling {
            Sampling::Stretch => imageops::resize(&image, width, height, FilterType::Nearest),
            Sampling::Uniform => DynamicImage::ImageRgb16(image)
                .resize(width, height, FilterType::Nearest)
                .into_rgb16(),
        })
    }

    fn blur(&self, image: Rgb16Image, radius: u32, sigma: f64) -> Result<Rgb16Image, BackendError> {
        let (w, h) = image.dimensions();
        if radius == 0 || w == 0 || h == 0 {
            return Ok(image);
        }
        let kernel = gaussian_kernel(radius, sigma);
        let r = i64::from(radius);
        let stride = w as usize * 3;
        let src: Vec<f32> = image.as_raw().iter().map(|&v| f32::from(v)).collect();

        // Horizontal pass into f32, then vertical pass back to u16.
        let mut horizontal = vec![0f32; src.len()];
        horizontal
            .par_chunks_mut(stride)
            .zip(src.par_chunks(stride))
            .for_each(|(out_row, row)| {
                for x in 0..i64::from(w) {
                    let mut acc = [0f32; 3];
                    for (k, weight) in kernel.iter().enumerate() {
                        let sx = (x + k as i64 - r).clamp(0, i64::from(w) - 1) as usize;
                        for (a, v) in acc.iter_mut().zip(&row[sx * 3..sx * 3 + 3]) {
                            *a += v * weight;
                        }
                    }
                    let o = x as usize * 3;
                    out_row[o..o + 3].copy_from_slice(&acc);
                }
            });

        let mut out = vec![0u16; src.len()];
        out.par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, out_row)| {
                let y = y as i64;
                for x in 0..w as usize {
                    let mut acc = [0f32; 3];
                    for (k, weight) in kernel.iter().enumerate() {
                        let sy = (y + k as i64 - r).clamp(0, i64::from(h) - 1) as usize;
                        let o = sy * stride + x * 3;
                        for (a, v) in acc.iter_mut().zip(&horizontal[o..o + 3]) {
                            *a += v * weight;
                        }
                    }
                    for (dst, a) in out_row[x * 3..x * 3 + 3].iter_mut().zip(acc) {
                        *dst = a.round().clamp(0.0, f32::from(MAX_CHANNEL)) as u16;
                    }
                }
            });

        Rgb16Image::from_raw(w, h, out).ok_or(BackendError::Buffer)
    }

    fn normalize(&self, mut image: Rgb16Image) -> Result<Rgb16Image, BackendError> {
        let total = u64::from(image.width()) * u64::from(image.height());
        let low_cut = (total as f64 * 0.02) as u64;
        let high_cut = (total as f64 * 0.01) as u64;

        for channel in 0..3 {
            let hist = channel_histogram(&image, channel);

            let mut seen = 0u64;
            let black = hist.iter().position(|&count| {
                seen += u64::from(count);
                seen > low_cut
            });
            seen = 0;
            let white = hist.iter().rposition(|&count| {
                seen += u64::from(count);
                seen > high_cut
            });

            let (Some(black), Some(white)) = (black, white) else {
                continue;
            };
            if white <= black {
                continue;
            }
            let span = (white - black) as u64;
            let lut: Vec<u16> = (0..LEVELS)
                .map(|v| {
                    if v <= black {
                        0
                    } else if v >= white {
                        MAX_CHANNEL
                    } else {
                        (((v - black) as u64 * u64::from(MAX_CHANNEL) + span / 2) / span) as u16
                    }
                })
                .collect();
            apply_lut(&mut image, channel, &lut);
        }
        Ok(image)
    }

    fn equalize(&self, mut image: Rgb16Image) -> Result<Rgb16Image, BackendError> {
        let total = u64::from(image.width()) * u64::from(image.height());

        for channel in 0..3 {
            let hist = channel_histogram(&image, channel);
            let mut cdf = Vec::with_capacity(LEVELS);
            let mut running = 0u64;
            for &count in &hist {
                running += u64::from(count);
                cdf.push(running);
            }
            let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
            let denom = total - cdf_min;
            if denom == 0 {
                // Single intensity: nothing to spread.
                continue;
            }
            let lut: Vec<u16> = cdf
                .iter()
                .map(|&c| {
                    let c = c.saturating_sub(cdf_min);
                    ((c * u64::from(MAX_CHANNEL) + denom / 2) / denom) as u16
                })
                .collect();
            apply_lut(&mut image, channel, &lut);
        }
        Ok(image)
    }

    fn add_border(
        &self,
        image: Rgb16Image,
        width: u32,
        height: u32,
    ) -> Result<Rgb16Image, BackendError> {
        if width == 0 && height == 0 {
            return Ok(image);
        }
        let (w, h) = image.dimensions();
        let mut canvas = Rgb16Image::new(w + 2 * width, h + 2 * height);
        imageops::replace(&mut canvas, &image, i64::from(width), i64::from(height));
        Ok(canvas)
    }

    fn threshold(&self, mut image: Rgb16Image, percent: f64) -> Result<Rgb16Image, BackendError> {
        let cut = percent / 100.0 * f64::from(MAX_CHANNEL);
        for px in image.pixels_mut() {
            let v = if luma(px.0) > cut { MAX_CHANNEL } else { 0 };
            px.0 = [v, v, v];
        }
        Ok(image)
    }

    fn quantize(
        &self,
        mut image: Rgb16Image,
        colors: u32,
        space: QuantizeSpace,
    ) -> Result<Rgb16Image, BackendError> {
        match space {
            QuantizeSpace::Gray => {
                let levels = colors.max(2);
                for px in image.pixels_mut() {
                    let gray = luma(px.0).round().clamp(0.0, f64::from(MAX_CHANNEL)) as u16;
                    let v = quantize_channel(gray, levels);
                    px.0 = [v, v, v];
                }
            }
            QuantizeSpace::Rgb => {
                let levels = levels_per_channel(colors);
                for px in image.pixels_mut() {
                    for v in px.0.iter_mut() {
                        *v = quantize_channel(*v, levels);
                    }
                }
            }
        }
        Ok(image)
    }

    fn pixel(&self, image: &Rgb16Image, x: u32, y: u32) -> [u16; 3] {
        image.get_pixel(x, y).0
    }

    fn export_bmp(&self, image: &Rgb16Image) -> Result<Vec<u8>, BackendError> {
        let rgb8 = DynamicImage::ImageRgb16(image.clone()).into_rgb8();
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(rgb8).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Bmp)?;
        Ok(bytes)
    }
}

/// Normalized Gaussian weights for offsets `-radius..=radius`.
fn gaussian_kernel(radius: u32, sigma: f64) -> Vec<f32> {
    let r = i64::from(radius);
    let two_sigma_sq = 2.0 * sigma * sigma;
    let weights: Vec<f64> = (-r..=r)
        .map(|i| (-((i * i) as f64) / two_sigma_sq).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

fn channel_histogram(image: &Rgb16Image, channel: usize) -> Vec<u32> {
    let mut hist = vec![0u32; LEVELS];
    for px in image.pixels() {
        hist[usize::from(px.0[channel])] += 1;
    }
    hist
}

fn apply_lut(image: &mut Rgb16Image, channel: usize, lut: &[u16]) {
    for px in image.pixels_mut() {
        px.0[channel] = lut[usize::from(px.0[channel])];
    }
}

/// Rec. 601 luma on the 0-65535 scale.
fn luma([r, g, b]: [u16; 3]) -> f64 {
    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
}

/// Snap a channel value to the nearest of `levels` evenly spaced levels.
fn quantize_channel(value: u16, levels: u32) -> u16 {
    let steps = u64::from(levels.max(2) - 1);
    let max = u64::from(MAX_CHANNEL);
    let level = (u64::from(value) * steps + max / 2) / max;
    ((level * max + steps / 2) / steps) as u16
}

/// Integer cube root of `colors`, at least 2.
fn levels_per_channel(colors: u32) -> u32 {
    let mut levels = 1u32;
    while u64::from(levels + 1).pow(3) <= u64::from(colors) {
        levels += 1;
    }
    levels.max(2)
}
