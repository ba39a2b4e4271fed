use super::fixtures::{small_config, write_horizontal_split, write_solid, write_vertical_split};
use imgprint::cache::FingerprintCache;
use imgprint::config::Colorspace;
use imgprint::duplicates::{find_dupes, DedupStats};
use imgprint::fetch::Fetcher;
use std::fs;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// a1, b1, a2, c, b2, broken: two pairs of scaled copies, one loner and
/// one undecodable file.
fn scenario() -> (TempDir, Vec<PathBuf>) {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let broken = root.join("broken.png");
    fs::write(&broken, b"garbage").unwrap();
    let files = vec![
        write_vertical_split(&root.join("a1.png"), 64, 64),
        write_horizontal_split(&root.join("b1.png"), 64, 64),
        write_vertical_split(&root.join("a2.png"), 128, 128),
        write_solid(&root.join("c.png"), 48, 48, [255, 255, 255]),
        write_horizontal_split(&root.join("b2.png"), 96, 96),
        broken,
    ];
    (dir, files)
}

fn fetch(files: &[PathBuf]) -> Vec<imgprint::fetch::FileFingerprint> {
    Fetcher::new(
        small_config(Colorspace::Mono1),
        FingerprintCache::disabled(),
        2,
    )
    .fetch_all(files)
    .unwrap()
}

#[test]
fn test_scaled_copies_group_together() {
    let (_dir, files) = scenario();
    let fetched = fetch(&files);

    let groups = find_dupes(&fetched, 90.0, Colorspace::Mono1).unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].index, 1);
    assert_eq!(groups[0].paths, vec![files[0].clone(), files[2].clone()]);
    assert_eq!(groups[1].index, 2);
    assert_eq!(groups[1].paths, vec![files[1].clone(), files[4].clone()]);

    let unfingerprinted = fetched.iter().filter(|f| f.fingerprint.is_none()).count();
    let stats = DedupStats::from_groups(fetched.len(), unfingerprinted, &groups);
    assert_eq!(stats.total_files, 6);
    assert_eq!(stats.unfingerprinted, 1);
    assert_eq!(stats.groups, 2);
    assert_eq!(stats.grouped_files, 4);
}

#[test]
fn test_low_threshold_lets_first_source_claim_everything() {
    let (_dir, files) = scenario();
    let fetched = fetch(&files);

    // Every decodable pair is at least 50% similar here.
    let groups = find_dupes(&fetched, 50.0, Colorspace::Mono1).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].index, 1);
    assert_eq!(groups[0].paths.len(), 5);
    assert!(!groups[0].paths.contains(&files[5]));
}

#[test]
fn test_input_order_picks_group_source() {
    let (_dir, mut files) = scenario();
    files.swap(0, 2);
    let fetched = fetch(&files);

    let groups = find_dupes(&fetched, 90.0, Colorspace::Mono1).unwrap();
    assert_eq!(groups[0].source(), files[0].as_path());
    assert!(groups[0].source().ends_with("a2.png"));
}

#[test]
fn test_threshold_of_100_needs_identical_fingerprints() {
    let (_dir, files) = scenario();
    let fetched = fetch(&files);

    let groups = find_dupes(&fetched, 100.0, Colorspace::Mono1).unwrap();
    assert_eq!(groups.len(), 2);
}
