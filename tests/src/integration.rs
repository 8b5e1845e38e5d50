use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_flaky_probe() {
    let mut cmd = Command::cargo_bin("perfstat-tests").unwrap();

    cmd.arg("flaky");
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("tick 1: 3 records, unavailable: []"))
        .stderr(predicate::str::contains("tick 2: 2 records, unavailable: [\"B\"]"))
        .stderr(predicate::str::contains("tick 3: 3 records, unavailable: []"))
        .stdout(predicate::str::contains("\"unavailable\":[\"B\"]"))
        .stdout(predicate::str::contains("\"final_drain\":true"))
        .stdout(predicate::str::contains("swapper").not());
}

#[test]
fn test_stop_immediately() {
    let mut cmd = Command::cargo_bin("perfstat-tests").unwrap();

    cmd.arg("stop-immediately");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("final_drain: true records: 1"))
        .stdout(predicate::str::contains("batches: 1"));
}
