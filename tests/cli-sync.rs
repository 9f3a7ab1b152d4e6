use assert_cmd::prelude::*;
use indoc::indoc;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn write_file(dir: &Path, rel: &str, content: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent dir");
    }
    fs::write(&path, content).expect("failed to write test file");
    path
}

#[test]
fn sync_missing_arguments() {
    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    cmd.arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--source"));
}

#[test]
fn sync_copies_new_files_and_merges_existing_yaml() {
    let dir = tempdir().expect("failed to create temp dir");
    let source = dir.path().join("templates");
    let target = dir.path().join("deployed");

    write_file(
        &source,
        "deploy.yaml",
        indoc! {"
            apiVersion: apps/v1
            images:
              - init
        "},
    );
    write_file(&source, "new/config.yaml", "kind: ConfigMap\n");
    write_file(&source, "scripts/run.sh", "#!/bin/sh\n");
    write_file(
        &target,
        "deploy.yaml",
        indoc! {"
            kind: Deployment
            images:
              - app
        "},
    );

    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    cmd.arg("sync")
        .arg("--source")
        .arg(&source)
        .arg("--target")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced"));

    // existing YAML was merged, both sides present, sequence de-duplicated
    let deploy = fs::read_to_string(target.join("deploy.yaml")).unwrap();
    assert!(deploy.contains("apiVersion: apps/v1"));
    assert!(deploy.contains("kind: Deployment"));
    assert!(deploy.contains("app"));
    assert!(deploy.contains("init"));

    // new files are plain copies
    assert_eq!(
        fs::read_to_string(target.join("new/config.yaml")).unwrap(),
        "kind: ConfigMap\n"
    );
    assert_eq!(
        fs::read_to_string(target.join("scripts/run.sh")).unwrap(),
        "#!/bin/sh\n"
    );
}

#[test]
fn sync_creates_the_target_directory() {
    let dir = tempdir().expect("failed to create temp dir");
    let source = dir.path().join("templates");
    let target = dir.path().join("not-yet-there");

    write_file(&source, "config.yaml", "kind: ConfigMap\n");

    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    cmd.arg("sync")
        .arg("--source")
        .arg(&source)
        .arg("--target")
        .arg(&target)
        .assert()
        .success();

    assert!(target.join("config.yaml").is_file());
}
