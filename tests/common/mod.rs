//! Shared fixtures for integration tests.
//!
//! Tests isolate all persistent state by pointing `MEET_DATA_DIR` at a
//! per-test temporary directory. Source-catalog tests build real local git
//! repositories to clone from; meet-run tests fabricate the store layout
//! directly (manifest plus clone directory), which needs no git at all.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

/// Runs a git command inside `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Initializes a git repository with identity config suitable for committing.
pub fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "--quiet"]);
    git(dir, &["config", "user.email", "tests@example.com"]);
    git(dir, &["config", "user.name", "Test Fixture"]);
}

/// Stages everything and commits.
pub fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "--quiet", "-m", message]);
}

/// Creates a committed source repository containing one dep file.
pub fn source_repo_with(dir: &Path, dep_file: &str) {
    init_repo(dir);
    std::fs::write(dir.join("deps.toml"), dep_file).unwrap();
    commit_all(dir, "add deps");
}

/// Fabricates a registered source without cloning: writes the manifest entry
/// and drops the dep file straight into the clone directory.
pub fn install_local_source(data_dir: &Path, name: &str, dep_file: &str) -> PathBuf {
    let clone = data_dir.join("sources").join(name);
    std::fs::create_dir_all(&clone).unwrap();
    std::fs::write(clone.join("deps.toml"), dep_file).unwrap();

    let manifest = data_dir.join("sources.toml");
    let mut text = if manifest.exists() {
        std::fs::read_to_string(&manifest).unwrap()
    } else {
        String::new()
    };
    text.push_str(&format!(
        "[[sources]]\nname = \"{name}\"\nuri = \"https://example.com/{name}.git\"\n\n"
    ));
    std::fs::write(&manifest, text).unwrap();
    clone
}

/// The `meet` binary with its data directory pinned to `data_dir`.
pub fn meet_cmd(data_dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("meet").unwrap();
    cmd.env("MEET_DATA_DIR", data_dir);
    cmd
}
