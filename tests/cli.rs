use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::process::Command; // Run programs

#[test]
fn missing_arguments() {
    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    cmd.assert().failure();
}

#[test]
/// `./opsctl merge` must have --base and --overlay args
fn merge_missing_arguments() {
    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    cmd.arg("merge")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--base"));
}

#[test]
/// `./opsctl gcp` requires a subcommand
fn gcp_missing_subcommand() {
    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    cmd.arg("gcp").assert().failure();
}

#[test]
fn gen_pass_default_length() {
    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    cmd.arg("gen-pass")
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated password:"));
}

#[test]
fn gen_pass_custom_length() {
    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    let output = cmd.arg("gen-pass").arg("--length").arg("24").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let password = stdout.trim().rsplit(' ').next().unwrap();
    assert_eq!(password.len(), 24);
}

#[test]
/// gcp commands refuse to run with the placeholder project
fn gcp_requires_a_real_project() {
    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    cmd.arg("gcp")
        .arg("firewall")
        .arg("export-rules")
        .assert()
        .failure()
        .stderr(predicate::str::contains("gcp-project must be set"));
}

#[test]
/// dry-run prints the would-be command without needing gcloud
fn gcp_create_database_dryrun() {
    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    cmd.arg("--gcp-project")
        .arg("my-project")
        .arg("--gcp-region")
        .arg("us-central1")
        .arg("gcp")
        .arg("cloudsql")
        .arg("create-database")
        .arg("--instance")
        .arg("nonprod-psql")
        .arg("--dbname")
        .arg("app-db")
        .arg("--dryrun")
        .assert()
        .success()
        .stderr(predicate::str::contains("Dry-run"))
        .stderr(predicate::str::contains("sql databases create app-db"));
}

#[test]
/// dry-run never leaks the password into the printed command
fn gcp_create_user_dryrun_masks_password() {
    let mut cmd = Command::cargo_bin("opsctl").unwrap();
    cmd.arg("--gcp-project")
        .arg("my-project")
        .arg("--gcp-region")
        .arg("us-central1")
        .arg("gcp")
        .arg("cloudsql")
        .arg("create-user")
        .arg("--instance")
        .arg("nonprod-psql")
        .arg("--username")
        .arg("app")
        .arg("--password")
        .arg("super-secret-password")
        .arg("--dryrun")
        .assert()
        .success()
        .stderr(predicate::str::contains("Dry-run"))
        .stderr(predicate::str::contains("super-secret-password").not());
}
