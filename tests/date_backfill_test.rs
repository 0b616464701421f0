use assert_cmd::Command;
use std::fs;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

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

# No date tags for any file: reads come back empty.
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
        .env("TZ", "UTC")
        .env("ARCHIVIST_SOURCE_DIR", source)
        .env("ARCHIVIST_TARGET_DIR", target)
        .env("ARCHIVIST_EXIFTOOL_BIN", exiftool)
        .env("ARCHIVIST_MIN_FILE_AGE_SECS", "0")
        .env("ARCHIVIST_LEDGER_MIN_IDLE_SECS", "0");
    cmd
}

#[test]
fn filesystem_fallback_date_is_written_back_into_the_target() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    let event_log = tmp.path().join("exiftool.log");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");

    let src_file = source.join("noexif.png");
    fs::write(&src_file, b"png bytes").expect("write source file");
    // 2021-07-04T00:00:00Z
    let handle = fs::File::options()
        .write(true)
        .open(&src_file)
        .expect("open source file");
    handle
        .set_modified(UNIX_EPOCH + Duration::from_secs(1_625_356_800))
        .expect("set mtime");
    drop(handle);

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("EXIFTOOL_TEST_LOG", &event_log)
        .arg("ingest")
        .assert()
        .success();

    let placed = target.join("2021/2021-07/2021-07-04/noexif.png");
    assert!(placed.is_file(), "expected {}", placed.display());

    let log = fs::read_to_string(&event_log).expect("read exiftool log");
    let write_line = log
        .lines()
        .find(|line| line.contains("-overwrite_original"))
        .expect("a CreateDate write must have happened");
    assert!(write_line.contains("-CreateDate=2021:07:04 00:00:00"));
    // The backfill targets the archived copy, not the source.
    assert!(write_line.contains("2021/2021-07/2021-07-04/noexif.png"));
}

#[test]
fn stamped_filename_resolves_without_a_metadata_read() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    let event_log = tmp.path().join("exiftool.log");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");
    fs::write(source.join("2023-01-02_03-04-05_-_clip.mp4"), b"mp4 bytes")
        .expect("write source file");

    let exiftool = tmp.path().join("exiftool");
    write_fake_exiftool(&exiftool);

    archivist_cmd(tmp.path(), &source, &target, &exiftool)
        .env("EXIFTOOL_TEST_LOG", &event_log)
        .arg("ingest")
        .assert()
        .success();

    // Renaming is off, so the old stamp prefix is stripped.
    let placed = target.join("2023/2023-01/2023-01-02/clip.mp4");
    assert!(placed.is_file(), "expected {}", placed.display());

    let log = fs::read_to_string(&event_log).unwrap_or_default();
    // No read invocation for the stamped file (reads carry -dateFormat).
    assert!(
        !log.lines().any(|line| line.contains("-dateFormat")),
        "metadata tool must not be consulted for stamped names:\n{log}"
    );
    // The name-derived date still gets written into the archived copy.
    let write_line = log
        .lines()
        .find(|line| line.contains("-overwrite_original"))
        .expect("a CreateDate write must have happened");
    assert!(write_line.contains("-CreateDate=2023:01:02 03:04:05"));
}

#[test]
fn unusable_tool_degrades_to_the_filesystem_date() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("source");
    let target = tmp.path().join("target");
    fs::create_dir_all(&source).expect("mkdir source");
    fs::create_dir_all(&target).expect("mkdir target");

    let src_file = source.join("photo.jpg");
    fs::write(&src_file, b"jpeg bytes").expect("write source file");
    let handle = fs::File::options()
        .write(true)
        .open(&src_file)
        .expect("open source file");
    handle
        .set_modified(UNIX_EPOCH + Duration::from_secs(1_625_356_800))
        .expect("set mtime");
    drop(handle);

    // A binary path that does not exist and an empty PATH: the tool is
    // unavailable, the run must still succeed via the mtime fallback.
    archivist_cmd(tmp.path(), &source, &target, &tmp.path().join("missing"))
        .env("PATH", tmp.path())
        .arg("ingest")
        .assert()
        .success();

    let placed = target.join("2021/2021-07/2021-07-04/photo.jpg");
    assert!(placed.is_file(), "expected {}", placed.display());
}
