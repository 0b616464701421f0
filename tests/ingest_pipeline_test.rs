use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

fn write_fake_exiftool(bin_path: &Path) {
    let script = r#"#!/usr/bin/env bash
if [[ -n "${EXIFTOOL_TEST_LOG:-}" ]]; then
  printf '%s\n' "$*" >> "${EXIFTOOL_TEST_LOG}"
fi

for arg in "$@"; do
  if [[ "$arg" == "-overwrite_original" ]]; then
    exit 0
  fi
done

case "${1:-}" in
  *.jpg)
    echo "CreateDate: 2022-05-03_10-11-12"
    ;;
esac
exit 0
"#;
    fs::write(bin_path, script).expect("write fake exiftool");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(bin_path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(bin_path, perms).expect("chmod");
    }
}

fn archivist_cmd(tmp: &Path, source: &Path, target: &Path, exiftool: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("archivist");
    cmd.current_dir(tmp)
        .env("HOME", tmp)
        .env("ARCHIVIST_SOURCE_DIR", source)
        .env("ARCHIVIST_TARGET_DIR", target)
        .env("ARCHIVIST_EXIFTOOL_BIN", exiftool)
        .env("ARCHIVIST_MIN_FILE_AGE_SECS", "0")
        .env("ARCHIVIST_LEDGER_MIN_IDLE_SECS", "0");
    cmd
}

#[test]
fn embedded_create_date_places_the_file_by_day() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");
    fs::write(source.join("IMG_0001.jpg"), b"jpeg bytes").expect("write source file");

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .arg("ingest")
        .assert()
        .success()
        .stdout(predicate::str::contains("files_processed=1"));

    let placed = target.join("2022/2022-05/2022-05-03/IMG_0001.jpg");
    assert!(placed.is_file(), "expected {}", placed.display());
    // Default mode moves, so the source copy is gone but the ledger stays.
    assert!(!source.join("IMG_0001.jpg").exists());
    assert!(source.join("archivist.sqlite3").is_file());
}

#[test]
fn rename_mode_prefixes_the_resolved_stamp() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");
    fs::write(source.join("IMG_0002.jpg"), b"jpeg bytes").expect("write source file");

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("ARCHIVIST_RENAME_FILES", "true")
        .arg("ingest")
        .assert()
        .success();

    let placed = target.join("2022/2022-05/2022-05-03/2022-05-03_10-11-12_-_IMG_0002.jpg");
    assert!(placed.is_file(), "expected {}", placed.display());
}

#[test]
fn second_run_over_unchanged_source_is_a_no_op() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");
    fs::write(source.join("IMG_0003.jpg"), b"jpeg bytes").expect("write source file");

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("ARCHIVIST_MOVE_FILES", "false")
        .arg("ingest")
        .assert()
        .success()
        .stdout(predicate::str::contains("files_processed=1"));

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("ARCHIVIST_MOVE_FILES", "false")
        .arg("ingest")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("files_processed=0")
                .and(predicate::str::contains("skipped_known=1")),
        );

    let day_dir = target.join("2022/2022-05/2022-05-03");
    let entries = fs::read_dir(&day_dir).expect("read day dir").count();
    assert_eq!(entries, 1);
}

#[test]
fn changed_mtime_reprocesses_and_converges() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");
    let src_file = source.join("IMG_0004.jpg");
    fs::write(&src_file, b"jpeg bytes").expect("write source file");

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("ARCHIVIST_MOVE_FILES", "false")
        .arg("ingest")
        .assert()
        .success()
        .stdout(predicate::str::contains("files_processed=1"));

    // Pretend the file was rewritten after ingestion.
    let handle = fs::File::options()
        .write(true)
        .open(&src_file)
        .expect("open source file");
    handle
        .set_modified(SystemTime::now() - Duration::from_secs(5000))
        .expect("set mtime");
    drop(handle);

    // Unknown again, but the target already exists: skipped yet
    // re-recorded with the new mtime.
    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("ARCHIVIST_MOVE_FILES", "false")
        .arg("ingest")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("skipped_existing=1")
                .and(predicate::str::contains("files_processed=0")),
        );

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("ARCHIVIST_MOVE_FILES", "false")
        .arg("ingest")
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped_known=1"));
}

#[test]
fn existing_target_is_skipped_but_recorded() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");
    fs::write(source.join("IMG_0005.jpg"), b"new bytes").expect("write source file");

    let day_dir = target.join("2022/2022-05/2022-05-03");
    fs::create_dir_all(&day_dir).expect("mkdir day dir");
    fs::write(day_dir.join("IMG_0005.jpg"), b"old bytes").expect("write existing target");

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("ARCHIVIST_MOVE_FILES", "false")
        .arg("ingest")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("skipped_existing=1")
                .and(predicate::str::contains("files_processed=0")),
        );

    // Neither side was touched.
    assert_eq!(
        fs::read(day_dir.join("IMG_0005.jpg")).expect("read target"),
        b"old bytes"
    );
    assert!(source.join("IMG_0005.jpg").is_file());

    // The skip was recorded, so the next run does not re-examine it.
    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("ARCHIVIST_MOVE_FILES", "false")
        .arg("ingest")
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped_known=1"));
}

#[test]
fn recently_touched_ledger_aborts_the_run() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");
    fs::write(source.join("IMG_0006.jpg"), b"jpeg bytes").expect("write source file");
    // A ledger touched just now means another run is (or was) active.
    fs::write(source.join("archivist.sqlite3"), b"").expect("touch ledger");

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("ARCHIVIST_LEDGER_MIN_IDLE_SECS", "9999")
        .arg("ingest")
        .assert()
        .failure()
        .stderr(predicate::str::contains("another run may still be active"));

    // Aborted before touching anything.
    assert!(source.join("IMG_0006.jpg").is_file());
}

#[test]
fn missing_source_root_fails_before_any_mutation() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let target = tmp.path().join("target");
    fs::create_dir_all(&target).expect("mkdir target");

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &tmp.path().join("nope"), &target, &exiftool)
        .arg("ingest")
        .assert()
        .failure()
        .stderr(predicate::str::contains("source directory"));
}

#[test]
fn status_reports_ledger_entries_after_a_run() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");
    fs::write(source.join("IMG_0007.jpg"), b"jpeg bytes").expect("write source file");

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .arg("ingest")
        .assert()
        .success();

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("ledger.entries=1"));
}

#[test]
fn configured_subfolder_is_used_for_matching_extensions() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");
    fs::write(source.join("IMG_0008.jpg"), b"jpeg bytes").expect("write source file");

    let config_path = tmp.path().join("archivist.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[transfer]
source_dir = "{source}"
target_dir = "{target}"
move_files = true
rename_files = false
overwrite_existing = false

[categories.web_images]
extensions = ["jpg", "jpeg"]
subfolder = "web"
"#,
            source = source.display(),
            target = target.display(),
        ),
    )
    .expect("write config");

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .arg("--config")
        .arg(&config_path)
        .arg("ingest")
        .assert()
        .success();

    let placed = target.join("2022/2022-05/2022-05-03/web/IMG_0008.jpg");
    assert!(placed.is_file(), "expected {}", placed.display());
}
