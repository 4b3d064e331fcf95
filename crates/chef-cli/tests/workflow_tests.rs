//! Workflow tests driving the `cluster-chef` binary over a scratch directory

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn chef_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cluster-chef").expect("Failed to find cluster-chef binary");
    cmd.current_dir(dir.path())
        .env_remove("CLUSTER_CHEF_PATH")
        .env_remove("RUST_LOG")
        .arg("--no-global");
    cmd
}

fn write_cluster(dir: &TempDir, file: &str, content: &str) {
    let clusters = dir.path().join("clusters");
    fs::create_dir_all(&clusters).unwrap();
    fs::write(clusters.join(file), content).unwrap();
}

#[test]
fn test_default_clusters_directory_is_used() {
    let dir = TempDir::new().unwrap();
    write_cluster(&dir, "demo.toml", "[cluster]\nname = \"demo\"\n\n[facets.web]\ninstances = 2\n");

    chef_cmd(&dir)
        .args(["show", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo-web-1"));
}

#[test]
fn test_edit_then_show_reflects_change() {
    let dir = TempDir::new().unwrap();
    write_cluster(&dir, "demo.toml", "[cluster]\nname = \"demo\"\n\n[facets.web]\n");
    chef_cmd(&dir)
        .args(["show", "demo", "web", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));

    write_cluster(&dir, "demo.toml", "[cluster]\nname = \"demo\"\n\n[facets.web]\ninstances = 3\n");
    chef_cmd(&dir)
        .args(["show", "demo", "web", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo-web-1"));
}

#[test]
fn test_verbose_logs_to_stderr() {
    let dir = TempDir::new().unwrap();
    write_cluster(&dir, "demo.toml", "[cluster]\nname = \"demo\"\n");

    chef_cmd(&dir)
        .args(["--verbose", "plan", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Provisioning plan for"))
        .stderr(predicate::str::contains("Resolved cluster"));
}

#[test]
fn test_missing_path_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    chef_cmd(&dir)
        .args(["--path", "nowhere", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No clusters found"));
}
