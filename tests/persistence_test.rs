#![cfg(feature = "storage-rocksdb")]

mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use common::{catalog_csv, script};
use predicates::prelude::*;
use std::process::Command;

fn replay(db: &std::path::Path, catalog: &std::path::Path, lines: &[&str]) -> assert_cmd::assert::Assert {
    let requests = script(lines);
    let mut cmd = Command::new(cargo_bin!("filmrent"));
    cmd.arg("--db-path")
        .arg(db)
        .arg("--catalog")
        .arg(catalog)
        .arg("replay")
        .arg(requests.path());
    cmd.assert()
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("rentals_db");
    let catalog = catalog_csv(dir.path());

    replay(&db, &catalog, &["RENT;2;11"])
        .success()
        .stdout(predicate::eq("RENT_RESULT;OK;10.00\n"));

    // Reseeding the catalog keeps the stored availability.
    replay(&db, &catalog, &["RENT;2;12", "LIST_FILMS"])
        .success()
        .stdout(predicate::str::starts_with("RENT_RESULT;ITEM_UNAVAILABLE;0.00\n"))
        .stdout(predicate::str::contains("FILM;2;Heat;RENTED\n"));

    replay(&db, &catalog, &["PAY;1;11", "RENT;2;12", "LIST_FEES;12"])
        .success()
        .stdout(predicate::str::starts_with("PAY_RESULT;SETTLED;"))
        .stdout(predicate::str::contains("RENT_RESULT;OK;10.00\n"))
        .stdout(predicate::str::contains("FEE;2;"));
}
