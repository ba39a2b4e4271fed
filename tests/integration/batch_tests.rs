use super::fixtures::{small_config, write_horizontal_split, write_vertical_split};
use imgprint::batch::{run_batch, BatchError};
use imgprint::cache::FingerprintCache;
use imgprint::config::Colorspace;
use imgprint::fetch::Fetcher;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn fetcher() -> Fetcher {
    Fetcher::new(
        small_config(Colorspace::Mono1),
        FingerprintCache::disabled(),
        2,
    )
}

fn make_dirs(root: &Path) -> (PathBuf, PathBuf) {
    let cats = root.join("cats");
    let dogs = root.join("dogs");
    fs::create_dir_all(cats.join("nested")).unwrap();
    fs::create_dir_all(&dogs).unwrap();
    write_vertical_split(&cats.join("small.png"), 64, 64);
    write_vertical_split(&cats.join("large.png"), 128, 128);
    write_vertical_split(&cats.join("nested").join("mid.png"), 96, 96);
    write_horizontal_split(&dogs.join("one.png"), 64, 64);
    write_horizontal_split(&dogs.join("two.png"), 80, 80);
    (cats, dogs)
}

#[test]
fn test_batch_intra_and_cross_directory() {
    let root = tempdir().unwrap();
    let (cats, dogs) = make_dirs(root.path());

    let reports = run_batch(
        &fetcher(),
        &[cats.clone(), dogs.clone()],
        Colorspace::Mono1,
        None,
    )
    .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].dir, cats);
    assert_eq!(reports[0].files, 3);
    assert_eq!(reports[0].min_match, Some(100.0));
    assert_eq!(reports[0].max_mismatch.len(), 1);
    assert_eq!(reports[0].max_mismatch[0].other, dogs);
    assert_eq!(reports[0].max_mismatch[0].max_mismatch, Some(50.0));

    assert_eq!(reports[1].dir, dogs);
    assert_eq!(reports[1].files, 2);
    assert_eq!(reports[1].min_match, Some(100.0));
    assert_eq!(reports[1].max_mismatch[0].other, cats);
    assert_eq!(reports[1].max_mismatch[0].max_mismatch, Some(50.0));
}

#[test]
fn test_batch_single_file_directory_has_no_min() {
    let root = tempdir().unwrap();
    let solo = root.path().join("solo");
    fs::create_dir(&solo).unwrap();
    write_vertical_split(&solo.join("only.png"), 32, 32);

    let reports = run_batch(&fetcher(), &[solo], Colorspace::Mono1, None).unwrap();
    assert_eq!(reports[0].files, 1);
    assert_eq!(reports[0].min_match, None);
    assert!(reports[0].max_mismatch.is_empty());
}

#[test]
fn test_batch_undecodable_file_scores_zero() {
    let root = tempdir().unwrap();
    let (cats, _dogs) = make_dirs(root.path());
    fs::write(cats.join("notes.txt"), b"not an image").unwrap();

    let reports = run_batch(&fetcher(), &[cats], Colorspace::Mono1, None).unwrap();
    assert_eq!(reports[0].files, 4);
    assert_eq!(reports[0].min_match, Some(0.0));
}

#[test]
fn test_batch_missing_directory_fails() {
    let root = tempdir().unwrap();
    let missing = root.path().join("missing");

    let err = run_batch(&fetcher(), &[missing], Colorspace::Mono1, None).unwrap_err();
    assert!(matches!(err, BatchError::Scan(_)));
}
