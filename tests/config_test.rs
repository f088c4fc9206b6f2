//! Tests for `src/config.rs`.

use std::fs;
use std::path::PathBuf;

use logcast::config::{self, Config};
use logcast::scanner::ScanMode;

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).expect("write config");
    (dir, path)
}

#[test]
fn full_config_parses() {
    let (_dir, path) = write_config(
        r#"
[corpus]
root_dir = "/srv/syslog"
file_pattern = "\\.log$"
months = [5, 6, 7, 8, 9, 10, 11]

[snapshot]
path = "/var/lib/logcast/stats.json"

[scan]
sample_lines = 500

[aggregate]
monthly_top_n = 3
global_top_n = 10

[volume]
6 = 1000
"11" = 2000

[forecast]
top_n = 8
horizon_days = 7
max_events_per_type = 4
window_hours = 100.5
"#,
    );

    let config = match config::load_config(&path) {
        Ok(config) => config,
        Err(err) => panic!("config should load: {err:#}"),
    };

    assert_eq!(config.corpus.root_dir, PathBuf::from("/srv/syslog"));
    assert_eq!(config.corpus.months, vec![5, 6, 7, 8, 9, 10, 11]);
    assert_eq!(
        config.snapshot.path,
        PathBuf::from("/var/lib/logcast/stats.json")
    );

    let volumes = config.volume_table().expect("volume table");
    assert_eq!(volumes.get(6), 1000);
    assert_eq!(volumes.get(11), 2000);
    assert_eq!(volumes.get(1), 4_500_000);

    let build = config.build_options().expect("build options");
    assert_eq!(build.monthly_top_n, 3);
    assert_eq!(build.global_top_n, 10);

    let params = config.forecast_params();
    assert_eq!(params.top_n, 8);
    assert_eq!(params.horizon_days, 7);
    assert_eq!(params.max_events_per_type, 4);
    assert!((params.window_hours - 100.5).abs() < f64::EPSILON);

    assert_eq!(config.sampled_mode(), ScanMode::Sampled { max_lines: 500 });
    let options = config.scan_options(ScanMode::Full).expect("scan options");
    assert!(options.file_pattern.is_match("kern.log"));
    assert!(!options.file_pattern.is_match("kern.txt"));
}

#[test]
fn partial_sections_keep_defaults() {
    let (_dir, path) = write_config("[forecast]\nhorizon_days = 14\n");
    let config = config::load_config(&path).expect("load");

    assert_eq!(config.forecast.horizon_days, 14);
    assert_eq!(config.forecast.top_n, 15);
    assert_eq!(config.forecast.max_events_per_type, 10);
    assert_eq!(config.corpus.root_dir, PathBuf::from("syslog"));
    assert_eq!(config.snapshot.path, PathBuf::from("stats.json"));
    assert_eq!(config.aggregate.monthly_top_n, 5);
}

#[test]
fn bad_volume_key_is_rejected() {
    let (_dir, path) = write_config("[volume]\njuly = 5\n");
    assert!(config::load_config(&path).is_err());

    let (_dir, path) = write_config("[volume]\n0 = 5\n");
    assert!(config::load_config(&path).is_err());
}

#[test]
fn invalid_values_fail_validation() {
    for bad in [
        "[corpus]\nmonths = []\n",
        "[corpus]\nfile_pattern = \"(\"\n",
        "[scan]\nsample_lines = 0\n",
        "[forecast]\nwindow_hours = -1.0\n",
    ] {
        let (_dir, path) = write_config(bad);
        assert!(config::load_config(&path).is_err(), "accepted: {bad}");
    }
}

#[test]
fn malformed_toml_is_an_error() {
    let (_dir, path) = write_config("[corpus\nroot_dir = ");
    assert!(config::load_config(&path).is_err());
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(config::load_config(&dir.path().join("absent.toml")).is_err());
}

#[test]
fn missing_default_file_means_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config::load_or_default(&dir.path().join("absent.toml")).expect("defaults");
    let defaults = Config::default();
    assert_eq!(config.corpus.months, defaults.corpus.months);
    assert_eq!(config.scan.sample_lines, 2000);
}

#[test]
fn default_config_path_is_under_home() {
    let path = config::default_config_path().expect("home dir");
    assert!(path.ends_with(".logcast/config.toml"));
}
