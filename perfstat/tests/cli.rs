use assert_cmd::Command;
use predicates::prelude::predicate;

fn write_config(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("Perfstat.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_events() {
    let mut cmd = Command::cargo_bin("perfstat").unwrap();
    cmd.arg("events");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("instructions"))
        .stdout(predicate::str::contains("cache-misses"));
}

#[test]
fn test_check_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[collector]
interval_ms = 500

[[probes]]
name = "db-misses"
event = "cache-misses"
"#,
    );

    let mut cmd = Command::cargo_bin("perfstat").unwrap();
    cmd.arg("check").arg("--config").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("db-misses"))
        .stdout(predicate::str::contains("interval_ms: 500"));
}

#[test]
fn test_check_rejects_zero_interval() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[collector]\ninterval_ms = 0\n");

    let mut cmd = Command::cargo_bin("perfstat").unwrap();
    cmd.arg("check").arg("--config").arg(&path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_run_rejects_unknown_probe() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "");

    let mut cmd = Command::cargo_bin("perfstat").unwrap();
    cmd.args(["run", "--probe", "llc-misses", "--config"]).arg(&path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown event: llc-misses"));
}
