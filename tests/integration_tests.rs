mod test_env;
// Integration tests for the directory commands (companies, dealers, users)
// These test the full CLI interface end-to-end

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use std::fs;

/// Helper to create a temporary database and an admin rc file
fn setup_test_env() -> (TempDir, std::sync::MutexGuard<'static, ()>) {
    let guard = test_env::lock_test_env();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let config_dir = temp_dir.path().join(".lotledger");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("rc"),
        format!("data.location={}\nuser.role=admin\n", db_path.display()),
    ).unwrap();
    (temp_dir, guard)
}

/// Helper to create a new command with test environment
fn new_cmd(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lotledger").unwrap();
    cmd.env("HOME", temp_dir.path());
    cmd
}

fn add_company(temp_dir: &TempDir, name: &str) {
    new_cmd(temp_dir).args(["companies", "add", name]).assert().success();
}

fn add_dealer(temp_dir: &TempDir, name: &str, company: &str) {
    new_cmd(temp_dir)
        .args(["dealers", "add", name, "--company", company, "--email", "desk@dealer.test"])
        .assert()
        .success();
}

#[test]
fn test_companies_add() {
    let (temp_dir, _guard) = setup_test_env();

    new_cmd(&temp_dir)
        .args(["companies", "add", "Acme Metals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created company 'Acme Metals'"));
}

#[test]
fn test_companies_add_duplicate_fails() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme Metals");

    new_cmd(&temp_dir)
        .args(["companies", "add", "Acme Metals"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_companies_add_numeric_name_fails() {
    let (temp_dir, _guard) = setup_test_env();

    new_cmd(&temp_dir)
        .args(["companies", "add", "42"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("purely numeric"));
}

#[test]
fn test_companies_list_and_search() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme Metals");
    add_company(&temp_dir, "Borealis Catalysts");

    new_cmd(&temp_dir)
        .args(["companies", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme Metals"))
        .stdout(predicate::str::contains("Borealis Catalysts"));

    new_cmd(&temp_dir)
        .args(["companies", "list", "--search", "bore"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Borealis Catalysts"))
        .stdout(predicate::str::contains("Acme Metals").not());
}

#[test]
fn test_companies_list_json() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme Metals");

    let output = new_cmd(&temp_dir)
        .args(["companies", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let companies: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let companies = companies.as_array().unwrap();
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0]["name"], "Acme Metals");
    assert_eq!(companies[0]["id"], 1);
}

#[test]
fn test_companies_rename() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");

    new_cmd(&temp_dir)
        .args(["companies", "rename", "Acme", "Acme Metals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Renamed company 'Acme' to 'Acme Metals'"));

    new_cmd(&temp_dir)
        .args(["companies", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme Metals"));
}

#[test]
fn test_companies_not_found_suggests() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");

    new_cmd(&temp_dir)
        .args(["companies", "rename", "Acmee", "Other"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains("Did you mean 'Acme'?"));
}

#[test]
fn test_companies_delete_refused_with_dealers() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");
    add_dealer(&temp_dir, "North Yard", "Acme");

    new_cmd(&temp_dir)
        .args(["companies", "delete", "Acme", "-y"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("still has 1 dealer(s)"));
}

#[test]
fn test_companies_delete() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");

    new_cmd(&temp_dir)
        .args(["companies", "delete", "Acme", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted company 'Acme'"));

    new_cmd(&temp_dir)
        .args(["companies", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme").not());
}

#[test]
fn test_dealers_add_and_list() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");

    new_cmd(&temp_dir)
        .args([
            "dealers", "add", "North Yard",
            "--company", "Acme",
            "--email", "north@acme.test",
            "--phone", "555-0101",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created dealer 'North Yard' (id: 1) for company 'Acme'"));

    new_cmd(&temp_dir)
        .args(["dealers", "list", "--company", "Acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("North Yard"))
        .stdout(predicate::str::contains("north@acme.test"));
}

#[test]
fn test_dealers_add_invalid_email() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");

    new_cmd(&temp_dir)
        .args(["dealers", "add", "North Yard", "--company", "Acme", "--email", "nobody"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid email"));
}

#[test]
fn test_dealers_same_name_in_two_companies() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");
    add_company(&temp_dir, "Borealis");
    add_dealer(&temp_dir, "Central", "Acme");
    add_dealer(&temp_dir, "Central", "Borealis");

    new_cmd(&temp_dir)
        .args(["dealers", "add", "Central", "--company", "Acme", "--email", "c@acme.test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists for company 'Acme'"));

    // Without a company the name is ambiguous
    new_cmd(&temp_dir)
        .args(["users", "add", "Dana", "--email", "dana@acme.test", "--dealer", "Central"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("matches 2 dealers"));
}

#[test]
fn test_dealers_modify_clears_phone() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");
    new_cmd(&temp_dir)
        .args([
            "dealers", "add", "North Yard",
            "--company", "Acme",
            "--email", "north@acme.test",
            "--phone", "555-0101",
        ])
        .assert()
        .success();

    new_cmd(&temp_dir)
        .args(["dealers", "modify", "1", "--phone", "", "--name", "North Depot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Modified dealer 1"));

    let output = new_cmd(&temp_dir)
        .args(["dealers", "list", "--json"])
        .output()
        .unwrap();
    let dealers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(dealers[0]["name"], "North Depot");
    assert!(dealers[0]["phone"].is_null());
    assert_eq!(dealers[0]["company"], "Acme");
}

#[test]
fn test_dealers_modify_not_found() {
    let (temp_dir, _guard) = setup_test_env();

    new_cmd(&temp_dir)
        .args(["dealers", "modify", "9", "--name", "Ghost"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Dealer 9 not found"));
}

#[test]
fn test_dealers_delete_refused_with_lots() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");
    add_dealer(&temp_dir, "North Yard", "Acme");
    new_cmd(&temp_dir)
        .args(["lots", "add", "--company", "Acme", "--dealer", "North Yard"])
        .assert()
        .success();

    new_cmd(&temp_dir)
        .args(["dealers", "delete", "1", "-y"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("still owns 1 lot(s)"));
}

#[test]
fn test_users_add_show_and_modify() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");
    add_dealer(&temp_dir, "North Yard", "Acme");

    new_cmd(&temp_dir)
        .args(["users", "add", "Dana Reyes", "--email", "dana@acme.test", "--dealer", "North Yard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created user 'Dana Reyes' (id: 1, role: user)"));

    new_cmd(&temp_dir)
        .args(["users", "show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dana@acme.test"))
        .stdout(predicate::str::contains("North Yard"))
        .stdout(predicate::str::contains("Phone:   N/A"));

    new_cmd(&temp_dir)
        .args(["users", "modify", "1", "--role", "admin", "--dealer", ""])
        .assert()
        .success();

    let output = new_cmd(&temp_dir)
        .args(["users", "show", "1", "--json"])
        .output()
        .unwrap();
    let user: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(user["role"], "admin");
    assert!(user["dealer_id"].is_null());
}

#[test]
fn test_users_duplicate_email_fails() {
    let (temp_dir, _guard) = setup_test_env();

    new_cmd(&temp_dir)
        .args(["users", "add", "Dana", "--email", "dana@acme.test"])
        .assert()
        .success();

    new_cmd(&temp_dir)
        .args(["users", "add", "Dana Two", "--email", "dana@acme.test"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_users_invalid_role() {
    let (temp_dir, _guard) = setup_test_env();

    new_cmd(&temp_dir)
        .args(["users", "add", "Dana", "--email", "dana@acme.test", "--role", "owner"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid role"));
}

#[test]
fn test_users_delete() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir)
        .args(["users", "add", "Dana", "--email", "dana@acme.test"])
        .assert()
        .success();

    new_cmd(&temp_dir)
        .args(["users", "delete", "1", "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted user 'Dana'"));

    new_cmd(&temp_dir)
        .args(["users", "show", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("User 1 not found"));
}

#[test]
fn test_dealers_modify_to_sibling_name_fails() {
    let (temp_dir, _guard) = setup_test_env();
    add_company(&temp_dir, "Acme");
    add_dealer(&temp_dir, "North", "Acme");
    add_dealer(&temp_dir, "South", "Acme");

    new_cmd(&temp_dir)
        .args(["dealers", "modify", "2", "--name", "North"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error:"))
        .stderr(predicate::str::contains("Dealer 'North' already exists for company 'Acme'"));

    // Same name under another company is fine
    add_company(&temp_dir, "Borealis");
    add_dealer(&temp_dir, "East", "Borealis");
    new_cmd(&temp_dir)
        .args(["dealers", "modify", "3", "--name", "North"])
        .assert()
        .success();
}
