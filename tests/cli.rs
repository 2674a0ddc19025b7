use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fieldbackup(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fieldbackup").unwrap();
    cmd.env("FIELD_BACKUP_DATA_DIR", data_dir.path())
        .env("RUST_LOG", "off");
    cmd
}

fn create_backup(data_dir: &TempDir) {
    fieldbackup(data_dir)
        .args(["backup", "create", "--no-photos", "-d", "nightly"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup created:"))
        .stdout(predicate::str::contains("[100%]"));
}

#[test]
fn test_config_shows_paths() {
    let temp = TempDir::new().unwrap();

    fieldbackup(&temp)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup directory:"))
        .stdout(predicate::str::contains(temp.path().to_string_lossy().as_ref()))
        .stdout(predicate::str::contains("Default strategy:   replace-all"));
}

#[test]
fn test_list_without_backups() {
    let temp = TempDir::new().unwrap();

    fieldbackup(&temp)
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups found."));
}

#[test]
fn test_create_then_list() {
    let temp = TempDir::new().unwrap();
    create_backup(&temp);

    fieldbackup(&temp)
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nightly"))
        .stdout(predicate::str::contains("Total: 1 backup(s)"));
}

#[test]
fn test_validate_latest() {
    let temp = TempDir::new().unwrap();
    create_backup(&temp);

    fieldbackup(&temp)
        .args(["backup", "validate", "latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checksum: OK"))
        .stdout(predicate::str::contains("Photo archive: absent"));
}

#[test]
fn test_restore_requires_force() {
    let temp = TempDir::new().unwrap();
    create_backup(&temp);

    fieldbackup(&temp)
        .args(["backup", "restore", "latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("run again with --force"))
        .stdout(predicate::str::contains("Restore complete!").not());

    fieldbackup(&temp)
        .args(["backup", "restore", "latest", "--strategy", "merge", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Strategy: merge"))
        .stdout(predicate::str::contains("Restore complete!"));
}

#[test]
fn test_estimate() {
    let temp = TempDir::new().unwrap();

    fieldbackup(&temp)
        .args(["backup", "estimate", "--no-photos"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Estimated backup size:"))
        .stdout(predicate::str::contains("without photos"));
}

#[test]
fn test_delete_unknown_backup_fails() {
    let temp = TempDir::new().unwrap();

    fieldbackup(&temp)
        .args(["backup", "delete", "deadbeef", "--force"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Backup not found: deadbeef"));
}

#[test]
fn test_delete_backup() {
    let temp = TempDir::new().unwrap();
    create_backup(&temp);

    fieldbackup(&temp)
        .args(["backup", "delete", "latest", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted backup"));

    fieldbackup(&temp)
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups found."));
}
