use super::fixtures::{small_config, write_horizontal_split, write_vertical_split};
use filetime::{set_file_mtime, FileTime};
use imgprint::cache::{CacheError, FingerprintCache};
use imgprint::config::{CacheMode, Colorspace};
use imgprint::fetch::Fetcher;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn fetcher(cache_path: &Path, mode: CacheMode) -> Fetcher {
    let cache = FingerprintCache::open(Some(cache_path), mode).unwrap();
    Fetcher::new(small_config(Colorspace::Mono1), cache, 2)
}

fn line_count(path: &Path) -> usize {
    fs::read_to_string(path).map(|s| s.lines().count()).unwrap_or(0)
}

#[test]
fn test_cache_initial_run_and_rerun() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("prints.cache");
    let files = vec![
        write_vertical_split(&dir.path().join("a.png"), 32, 32),
        write_horizontal_split(&dir.path().join("b.png"), 32, 32),
    ];

    let first = fetcher(&cache_path, CacheMode::ReadWrite);
    let computed = first.fetch_all(&files).unwrap();
    assert_eq!(first.stats(), (0, 2));
    assert_eq!(line_count(&cache_path), 2);
    drop(first);

    let second = fetcher(&cache_path, CacheMode::ReadWrite);
    assert_eq!(second.cache().path_count(), 2);
    let cached = second.fetch_all(&files).unwrap();
    assert_eq!(second.stats(), (2, 0));
    assert_eq!(cached, computed);
    assert_eq!(line_count(&cache_path), 2);
}

#[test]
fn test_cache_records_canonical_path() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("prints.cache");
    let file = write_vertical_split(&dir.path().join("with space.png"), 16, 16);

    let fetcher = fetcher(&cache_path, CacheMode::ReadWrite);
    let fp = fetcher.fetch(&file).unwrap().unwrap();
    drop(fetcher);

    let meta = fs::metadata(&file).unwrap();
    let canonical = fs::canonicalize(&file).unwrap();
    let line = fs::read_to_string(&cache_path).unwrap();
    let expected_tail = format!(" {} {} {}\n", meta.len(), fp, canonical.display());
    assert!(line.ends_with(&expected_tail), "{line:?}");
}

#[test]
fn test_cache_invalidation_on_mtime_change() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("prints.cache");
    let file = write_vertical_split(&dir.path().join("a.png"), 32, 32);
    set_file_mtime(&file, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    fetcher(&cache_path, CacheMode::ReadWrite)
        .fetch_all(&[file.clone()])
        .unwrap();

    set_file_mtime(&file, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
    let rerun = fetcher(&cache_path, CacheMode::ReadWrite);
    rerun.fetch_all(&[file.clone()]).unwrap();
    assert_eq!(rerun.stats(), (0, 1));
    drop(rerun);

    // Old record stays; the new one is appended after it.
    assert_eq!(line_count(&cache_path), 2);
    let content = fs::read_to_string(&cache_path).unwrap();
    assert!(content.starts_with("1600000000 "));
    assert!(content.lines().nth(1).unwrap().starts_with("1700000000 "));

    let third = fetcher(&cache_path, CacheMode::ReadWrite);
    third.fetch_all(&[file]).unwrap();
    assert_eq!(third.stats(), (1, 0));
}

#[test]
fn test_read_only_cache_never_writes() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("prints.cache");
    let file = write_vertical_split(&dir.path().join("a.png"), 16, 16);

    let fetcher = fetcher(&cache_path, CacheMode::ReadOnly);
    let result = fetcher.fetch_all(&[file]).unwrap();
    assert!(result[0].fingerprint.is_some());
    assert!(!cache_path.exists());
}

#[test]
fn test_read_only_cache_serves_existing_records() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("prints.cache");
    let file = write_vertical_split(&dir.path().join("a.png"), 16, 16);

    fetcher(&cache_path, CacheMode::ReadWrite)
        .fetch_all(&[file.clone()])
        .unwrap();

    let reader = fetcher(&cache_path, CacheMode::ReadOnly);
    reader.fetch_all(&[file]).unwrap();
    assert_eq!(reader.stats(), (1, 0));
}

#[test]
fn test_disabled_cache_always_recomputes() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("prints.cache");
    let file = write_vertical_split(&dir.path().join("a.png"), 16, 16);

    fetcher(&cache_path, CacheMode::ReadWrite)
        .fetch_all(&[file.clone()])
        .unwrap();

    let disabled = fetcher(&cache_path, CacheMode::Disabled);
    assert!(disabled.cache().path().is_none());
    disabled.fetch_all(&[file]).unwrap();
    assert_eq!(disabled.stats(), (0, 1));
}

#[test]
fn test_corrupt_cache_is_fatal() {
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("prints.cache");
    fs::write(&cache_path, "1 2 ff /ok.png\nnot a record\n").unwrap();

    let err = FingerprintCache::open(Some(&cache_path), CacheMode::ReadOnly).unwrap_err();
    match err {
        CacheError::MalformedLine { path, line } => {
            assert_eq!(path, cache_path);
            assert_eq!(line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_failed_files_are_not_cached() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("prints.cache");
    let broken = dir.path().join("broken.png");
    fs::write(&broken, b"nope").unwrap();
    let missing = dir.path().join("missing.png");

    let fetcher = fetcher(&cache_path, CacheMode::ReadWrite);
    let result = fetcher.fetch_all(&[broken, missing]).unwrap();
    assert!(result.iter().all(|f| f.fingerprint.is_none()));
    assert_eq!(line_count(&cache_path), 0);
}

#[test]
fn test_repeated_input_appends_one_record() {
    let dir = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache_path = cache_dir.path().join("prints.cache");
    let file = write_vertical_split(&dir.path().join("a.png"), 32, 32);

    let fetcher = fetcher(&cache_path, CacheMode::ReadWrite);
    let results = fetcher.fetch_all(&[file.clone(), file]).unwrap();
    assert_eq!(fetcher.stats(), (0, 1));
    drop(fetcher);

    assert_eq!(line_count(&cache_path), 1);
    assert_eq!(results[0].fingerprint, results[1].fingerprint);
    assert!(results[0].fingerprint.is_some());
}
