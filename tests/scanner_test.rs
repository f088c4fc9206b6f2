//! Tests for month directory scanning.

use std::fs;
use std::io::Write;
use std::path::Path;

use logcast::aggregate::MonthTally;
use logcast::scanner::{self, ScanMode, ScanOptions};

fn error_line(kind: &str, msg: &str) -> String {
    format!("host\tkern\terr\t-\t-\t2025-07-03 12:30:00\t-\t{kind}\t{msg}\n")
}

fn info_line(kind: &str) -> String {
    format!("host\tkern\tinfo\t-\t-\t2025-07-03 12:30:00\t-\t{kind}\tok\n")
}

fn write_file(dir: &Path, name: &str, lines: &[String]) {
    fs::create_dir_all(dir).expect("create month dir");
    let mut f = fs::File::create(dir.join(name)).expect("create file");
    for line in lines {
        f.write_all(line.as_bytes()).expect("write line");
    }
}

#[test]
fn month_with_malformed_and_error_lines() {
    let root = tempfile::tempdir().expect("tempdir");
    let month = root.path().join("07");

    write_file(&month, "a.txt", &["host\tkern\terr\tonly-four\n".to_owned()]);
    write_file(&month, "b.txt", &[error_line("DISK_FAIL", "sda1 offline")]);
    write_file(
        &month,
        "c.txt",
        &[error_line("DISK_FAIL", "sdb offline"), info_line("NET")],
    );

    let tally = scanner::scan_month(root.path(), 7, &ScanOptions::full());

    assert_eq!(tally.errors, 2);
    assert_eq!(tally.types.top(5), vec![("DISK_FAIL".to_owned(), 2)]);
    assert_eq!(tally.files_scanned, 3);
    assert_eq!(tally.failed_files, 0);
}

#[test]
fn missing_month_directory_is_empty() {
    let root = tempfile::tempdir().expect("tempdir");
    let tally = scanner::scan_month(root.path(), 3, &ScanOptions::full());
    assert_eq!(tally, MonthTally::empty(3));
}

#[test]
fn only_matching_files_are_scanned() {
    let root = tempfile::tempdir().expect("tempdir");
    let month = root.path().join("01");
    write_file(&month, "keep.TXT", &[error_line("A", "x")]);
    write_file(&month, "skip.log", &[error_line("B", "y")]);
    fs::create_dir_all(month.join("nested.txt")).expect("create nested dir");

    let files = scanner::list_month_files(&month, &ScanOptions::full().file_pattern)
        .expect("list files");
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("keep.TXT"));

    let tally = scanner::scan_month(root.path(), 1, &ScanOptions::full());
    assert_eq!(tally.types.get("A"), 1);
    assert_eq!(tally.types.get("B"), 0);
}

#[test]
fn custom_pattern_selects_other_extensions() {
    let root = tempfile::tempdir().expect("tempdir");
    let month = root.path().join("02");
    write_file(&month, "syslog.log", &[error_line("B", "y")]);

    let options = ScanOptions::new(ScanMode::Full, r"\.log$").expect("valid pattern");
    let tally = scanner::scan_month(root.path(), 2, &options);
    assert_eq!(tally.errors, 1);
}

#[test]
fn invalid_pattern_is_rejected() {
    let result = ScanOptions::new(ScanMode::Full, "(unclosed");
    assert!(matches!(result, Err(scanner::ScanError::Pattern { .. })));
}

#[test]
fn sampled_mode_caps_lines_per_file() {
    let root = tempfile::tempdir().expect("tempdir");
    let month = root.path().join("05");
    let lines: Vec<String> = (0..50).map(|i| error_line("FLOOD", &i.to_string())).collect();
    write_file(&month, "big.txt", &lines);
    write_file(&month, "small.txt", &lines[..3]);

    let sampled = scanner::scan_month(root.path(), 5, &ScanOptions::sampled(10));
    assert_eq!(sampled.errors, 13);

    let full = scanner::scan_month(root.path(), 5, &ScanOptions::full());
    assert_eq!(full.errors, 53);
}

#[test]
fn invalid_utf8_is_decoded_lossily() {
    let root = tempfile::tempdir().expect("tempdir");
    let month = root.path().join("04");
    fs::create_dir_all(&month).expect("create month dir");

    let mut bytes = b"host\tkern\terr\t-\t-\t2025-04-01 00:00:00\t-\tENC\tbad \xff\xfe bytes\n".to_vec();
    bytes.extend_from_slice(error_line("ENC", "fine").as_bytes());
    fs::write(month.join("enc.txt"), bytes).expect("write file");

    let tally = scanner::scan_month(root.path(), 4, &ScanOptions::full());
    assert_eq!(tally.errors, 2);
    assert_eq!(tally.failed_files, 0);
}

#[test]
fn scan_file_reports_open_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut tally = MonthTally::empty(1);
    let result = scanner::scan_file(
        &dir.path().join("absent.txt"),
        1,
        ScanMode::Full,
        &mut tally,
    );
    assert!(matches!(result, Err(scanner::ScanError::Open { .. })));
}

#[cfg(unix)]
#[test]
fn unreadable_file_does_not_stop_siblings() {
    use std::os::unix::fs::PermissionsExt;

    let root = tempfile::tempdir().expect("tempdir");
    let month = root.path().join("08");
    write_file(&month, "a_locked.txt", &[error_line("LOCKED", "x")]);
    write_file(&month, "b_open.txt", &[error_line("OPEN", "y")]);

    let locked = month.join("a_locked.txt");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");

    let tally = scanner::scan_month(root.path(), 8, &ScanOptions::full());
    assert_eq!(tally.types.get("OPEN"), 1);

    // Privileged users can still open the file; only assert the failure
    // path when the permission change actually took effect.
    if fs::File::open(&locked).is_err() {
        assert_eq!(tally.failed_files, 1);
        assert_eq!(tally.files_scanned, 1);
        assert_eq!(tally.types.get("LOCKED"), 0);
    }

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).expect("restore perms");
}

#[tokio::test]
async fn corpus_scan_is_ordered_by_month() {
    let root = tempfile::tempdir().expect("tempdir");
    write_file(&root.path().join("11"), "x.txt", &[error_line("LATE", "x")]);
    write_file(&root.path().join("02"), "x.txt", &[error_line("EARLY", "x")]);

    let tallies =
        scanner::scan_corpus(root.path(), &[11, 2, 5, 2], &ScanOptions::full()).await;

    let months: Vec<u8> = tallies.iter().map(|t| t.month).collect();
    assert_eq!(months, vec![2, 5, 11]);
    assert_eq!(tallies[0].types.get("EARLY"), 1);
    assert_eq!(tallies[1].errors, 0);
    assert_eq!(tallies[2].types.get("LATE"), 1);
}

#[test]
fn daily_counts_use_date_part() {
    let root = tempfile::tempdir().expect("tempdir");
    let month = root.path().join("07");
    write_file(
        &month,
        "d.txt",
        &[
            "h\tk\terr\t-\t-\t2025-07-01 01:00:00\t-\tA\tm\n".to_owned(),
            "h\tk\terr\t-\t-\t2025-07-01 23:59:59\t-\tA\tm\n".to_owned(),
            "h\tk\terr\t-\t-\t2025-07-02 08:00:00\t-\tB\tm\n".to_owned(),
            "h\tk\terr\t-\t-\tnot-a-date\t-\tC\tm\n".to_owned(),
        ],
    );

    let tally = scanner::scan_month(root.path(), 7, &ScanOptions::full());
    assert_eq!(tally.errors, 4);
    assert_eq!(tally.daily.len(), 2);

    let first = chrono::NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid date");
    assert_eq!(tally.daily.day(first).map(|t| t.get("A")), Some(2));
}
