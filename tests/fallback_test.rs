mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use common::script;
use predicates::prelude::*;
use std::process::Command;

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let requests = script(&["LIST_FILMS"]);
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::new(cargo_bin!("filmrent"));
    cmd.arg("--db-path")
        .arg(dir.path().join("some_db"))
        .arg("replay")
        .arg(requests.path());

    cmd.assert()
        .success()
        .stdout(predicate::eq("END\n"))
        .stderr(predicate::str::contains(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage.",
        ));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let requests = script(&["LIST_FILMS"]);
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::new(cargo_bin!("filmrent"));
    cmd.arg("--db-path")
        .arg(dir.path().join("test_db"))
        .arg("replay")
        .arg(requests.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Falling back").not());
}
