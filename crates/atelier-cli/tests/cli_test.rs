//! Integration tests for the `atelier` binary.
//!
//! Everything here runs without network access: the `prompt` subcommand is
//! only exercised up to its credential check.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;
use zip::ZipArchive;
use zip::write::SimpleFileOptions;

const BINARY: &str = env!("CARGO_BIN_EXE_atelier");

fn atelier(workspaces: &Path, args: &[&str]) -> Output {
    Command::new(BINARY)
        .arg("--workspaces-dir")
        .arg(workspaces)
        .args(args)
        .env_remove("ANTHROPIC_API_KEY")
        .output()
        .expect("run atelier")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "atelier failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn write_project(path: &Path) {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [("README.md", "# demo"), ("src/lib.rs", "fn main() {}")] {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    fs::write(path, writer.finish().unwrap().into_inner()).unwrap();
}

fn upload(dir: &TempDir) -> String {
    let project = dir.path().join("project.zip");
    write_project(&project);
    let out = stdout(&atelier(
        &dir.path().join("ws"),
        &["upload", project.to_str().unwrap()],
    ));
    let mut lines = out.lines();
    let id = lines.next().unwrap().to_string();
    assert_eq!(lines.collect::<Vec<_>>(), ["README.md", "src/lib.rs"]);
    id
}

#[test]
fn test_upload_then_files() {
    let dir = TempDir::new().unwrap();
    let id = upload(&dir);

    let out = stdout(&atelier(&dir.path().join("ws"), &["files", &id]));
    assert_eq!(out.lines().collect::<Vec<_>>(), ["README.md", "src/lib.rs"]);
}

#[test]
fn test_download_roundtrip() {
    let dir = TempDir::new().unwrap();
    let id = upload(&dir);
    let target = dir.path().join("out.zip");

    stdout(&atelier(
        &dir.path().join("ws"),
        &["download", &id, "-o", target.to_str().unwrap()],
    ));

    let mut archive = ZipArchive::new(fs::File::open(&target).unwrap()).unwrap();
    let mut content = String::new();
    archive
        .by_name("src/lib.rs")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "fn main() {}");
}

#[test]
fn test_remove_then_files_fails() {
    let dir = TempDir::new().unwrap();
    let ws = dir.path().join("ws");
    let id = upload(&dir);

    stdout(&atelier(&ws, &["remove", &id]));
    let output = atelier(&ws, &["files", &id]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("session not found"));
}

#[test]
fn test_prune_zero_hours_removes_everything() {
    let dir = TempDir::new().unwrap();
    let ws = dir.path().join("ws");
    let id = upload(&dir);

    let out = stdout(&atelier(&ws, &["prune", "--older-than-hours", "0"]));
    assert_eq!(out.trim(), id);
    assert!(fs::read_dir(&ws).unwrap().next().is_none());
}

#[test]
fn test_upload_rejects_non_zip() {
    let dir = TempDir::new().unwrap();
    let bogus = dir.path().join("notes.txt");
    fs::write(&bogus, "not an archive").unwrap();

    let output = atelier(&dir.path().join("ws"), &["upload", bogus.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a valid zip archive"));
}

#[test]
fn test_prompt_requires_api_key() {
    let dir = TempDir::new().unwrap();
    let output = atelier(
        &dir.path().join("ws"),
        &["prompt", "no-such-session", "add a file"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ANTHROPIC_API_KEY"));
}
