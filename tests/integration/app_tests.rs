use super::fixtures::{
    clear_env, write_horizontal_split, write_solid, write_vertical_split, ENV_MUTEX,
};
use clap::Parser;
use imgprint::cli::Cli;
use imgprint::error::ExitCode;
use imgprint::run_app;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// A directory of images plus an empty config file.
struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let config = dir.path().join("config.toml");
        fs::write(&config, "").unwrap();
        Self { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn str(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    /// Run with the cache disabled, progress hidden and no user config.
    fn run(&self, args: &[&str]) -> ExitCode {
        let mut argv = vec!["imgprint", "--quiet"];
        argv.extend_from_slice(args);
        argv.extend(["--cache-mode", "disabled", "--config", Self::str(&self.config)]);
        let cli = Cli::try_parse_from(argv).unwrap();
        run_app(cli).unwrap()
    }
}

#[test]
fn test_fingerprint_mode_succeeds() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    let a = write_vertical_split(&ws.path("a.png"), 32, 32);
    let b = write_horizontal_split(&ws.path("b.png"), 32, 32);

    let code = ws.run(&["fingerprint", Workspace::str(&a), Workspace::str(&b)]);
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_fingerprint_mode_recurses_directories() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    let nested = ws.path("nested");
    fs::create_dir_all(&nested).unwrap();
    write_vertical_split(&nested.join("a.png"), 32, 32);

    let code = ws.run(&["fingerprint", "-R", Workspace::str(ws.dir.path())]);
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_compare_mode_succeeds() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    let a = write_vertical_split(&ws.path("a.png"), 32, 32);
    let b = write_vertical_split(&ws.path("b.png"), 64, 64);

    let code = ws.run(&["compare", Workspace::str(&a), Workspace::str(&b)]);
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_compare_mode_same_file_twice() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    let a = write_vertical_split(&ws.path("a.png"), 32, 32);

    let code = ws.run(&["compare", Workspace::str(&a), Workspace::str(&a), "-o", "json"]);
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_match_mode_succeeds() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    let target = write_vertical_split(&ws.path("target.png"), 32, 32);
    let near = write_vertical_split(&ws.path("near.png"), 48, 48);
    let far = write_horizontal_split(&ws.path("far.png"), 32, 32);

    let code = ws.run(&[
        "match",
        Workspace::str(&target),
        Workspace::str(&near),
        Workspace::str(&far),
        "--threshold",
        "90",
    ]);
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_find_dupes_modes_succeed() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    write_vertical_split(&ws.path("a1.png"), 32, 32);
    write_vertical_split(&ws.path("a2.png"), 64, 64);
    write_solid(&ws.path("white.png"), 16, 16, [255, 255, 255]);
    let root = Workspace::str(ws.dir.path());

    assert_eq!(ws.run(&["find-dupes", root]), ExitCode::Success);
    assert_eq!(ws.run(&["find-dupes-oneline", root]), ExitCode::Success);
    assert_eq!(ws.run(&["find-dupes", root, "-o", "csv"]), ExitCode::Success);
}

#[test]
fn test_undecodable_file_does_not_fail_run() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    write_vertical_split(&ws.path("a1.png"), 32, 32);
    write_vertical_split(&ws.path("a2.png"), 64, 64);
    fs::write(ws.path("broken.png"), b"not really a png").unwrap();
    let root = Workspace::str(ws.dir.path());

    assert_eq!(ws.run(&["find-dupes", root]), ExitCode::Success);
    assert_eq!(ws.run(&["fingerprint", root]), ExitCode::Success);
}

#[test]
fn test_test_mode_succeeds() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();
    let cats = ws.path("cats");
    let dogs = ws.path("dogs");
    fs::create_dir_all(&cats).unwrap();
    fs::create_dir_all(&dogs).unwrap();
    write_vertical_split(&cats.join("small.png"), 32, 32);
    write_vertical_split(&cats.join("large.png"), 64, 64);
    write_horizontal_split(&dogs.join("one.png"), 32, 32);
    write_horizontal_split(&dogs.join("two.png"), 48, 48);

    let code = ws.run(&["test", Workspace::str(&cats), Workspace::str(&dogs)]);
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_config_mode_succeeds() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let ws = Workspace::new();

    assert_eq!(ws.run(&["config"]), ExitCode::Success);
}
