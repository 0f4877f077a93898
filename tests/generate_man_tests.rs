use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use std::fs;

#[test]
fn test_generate_man_writes_pages() {
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("man");

    Command::cargo_bin("generate-man").unwrap()
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("lotledger.1"));

    let main_page = fs::read_to_string(out_dir.join("lotledger.1")).unwrap();
    assert!(main_page.contains("lotledger"));
    assert!(out_dir.join("lotledger-lots.1").exists());
    assert!(out_dir.join("lotledger-lots-advance.1").exists());
    assert!(out_dir.join("lotledger-dashboard.1").exists());
}
