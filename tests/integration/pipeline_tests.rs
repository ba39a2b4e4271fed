use super::fixtures::{
    small_config, write_horizontal_split, write_solid, write_vertical_split,
};
use imgprint::config::{Colorspace, SquareMode};
use imgprint::fingerprint::pipeline::PipelineConfig;
use imgprint::fingerprint::{ImageProcessingError, Pipeline};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_mono_split_fingerprint() {
    let dir = tempdir().unwrap();
    let path = write_vertical_split(&dir.path().join("split.png"), 64, 64);

    let fp = Pipeline::new(small_config(Colorspace::Mono1))
        .compute(&path)
        .unwrap();

    // Each row reads black, black, white, white.
    assert_eq!(fp.as_str(), "3333");
}

#[test]
fn test_gray_split_fingerprint() {
    let dir = tempdir().unwrap();
    let path = write_horizontal_split(&dir.path().join("split.png"), 64, 64);

    let fp = Pipeline::new(small_config(Colorspace::Gray4))
        .compute(&path)
        .unwrap();

    assert_eq!(fp.as_str(), "00000000ffffffff");
}

#[test]
fn test_fingerprint_lengths_per_colorspace() {
    let dir = tempdir().unwrap();
    let path = write_vertical_split(&dir.path().join("split.png"), 40, 30);

    for (colorspace, size, len) in [
        (Colorspace::Mono1, 16, 64),
        (Colorspace::Gray4, 8, 64),
        (Colorspace::Rgb12, 8, 192),
        (Colorspace::Mono1, 3, 3),
    ] {
        let config = PipelineConfig {
            size,
            ..small_config(colorspace)
        };
        let fp = Pipeline::new(config).compute(&path).unwrap();
        assert_eq!(fp.len(), len, "{colorspace} size {size}");
    }
}

#[test]
fn test_scaled_copies_share_fingerprint() {
    let dir = tempdir().unwrap();
    let small = write_vertical_split(&dir.path().join("small.png"), 64, 64);
    let large = write_vertical_split(&dir.path().join("large.png"), 256, 256);

    let pipeline = Pipeline::new(small_config(Colorspace::Gray4));
    assert_eq!(
        pipeline.compute(&small).unwrap(),
        pipeline.compute(&large).unwrap()
    );
}

#[test]
fn test_pad_and_stretch_differ_for_wide_images() {
    let dir = tempdir().unwrap();
    let path = write_vertical_split(&dir.path().join("wide.png"), 128, 64);

    let padded = Pipeline::new(small_config(Colorspace::Mono1))
        .compute(&path)
        .unwrap();
    let stretched = Pipeline::new(PipelineConfig {
        square_mode: SquareMode::Stretch,
        ..small_config(Colorspace::Mono1)
    })
    .compute(&path)
    .unwrap();

    // Padding adds black bands above and below.
    assert_eq!(padded.as_str(), "0330");
    assert_eq!(stretched.as_str(), "3333");
}

#[test]
fn test_quick_resize_keeps_shape() {
    let dir = tempdir().unwrap();
    let path = write_vertical_split(&dir.path().join("big.png"), 256, 256);

    let fp = Pipeline::new(PipelineConfig {
        quick_resize: 64,
        ..small_config(Colorspace::Mono1)
    })
    .compute(&path)
    .unwrap();

    assert_eq!(fp.as_str(), "3333");
}

#[test]
fn test_solid_image_is_deterministic() {
    let dir = tempdir().unwrap();
    let path = write_solid(&dir.path().join("red.png"), 20, 20, [200, 30, 30]);

    let pipeline = Pipeline::new(small_config(Colorspace::Rgb12));
    let first = pipeline.compute(&path).unwrap();
    let second = pipeline.compute(&path).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 48);
}

#[test]
fn test_undecodable_file_fails_at_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("not-an-image.png");
    fs::write(&path, b"plain text").unwrap();

    let err = Pipeline::new(small_config(Colorspace::Mono1))
        .compute(&path)
        .unwrap_err();
    match err {
        ImageProcessingError::Step { step, path: p, .. } => {
            assert_eq!(step, "load");
            assert_eq!(p, path);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_debug_dir_receives_bitmap() {
    let dir = tempdir().unwrap();
    let debug = tempdir().unwrap();
    let path = write_vertical_split(&dir.path().join("split.png"), 32, 32);

    Pipeline::new(PipelineConfig {
        debug_dir: Some(debug.path().to_path_buf()),
        ..small_config(Colorspace::Mono1)
    })
    .compute(&path)
    .unwrap();

    let written: Vec<_> = fs::read_dir(debug.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].extension().unwrap(), "bmp");
    assert!(image::open(&written[0]).is_ok());
}
