//! Configuration loading and validation.
//!
//! Loads `config.toml` with per-section defaults. Every section uses
//! `#[serde(default)]`, so a minimal or empty file is valid, and a missing
//! file means "all defaults". Command-line flags override file values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::forecast::{ForecastParams, DEFAULT_WINDOW_HOURS};
use crate::scanner::{ScanMode, ScanOptions, DEFAULT_FILE_PATTERN, DEFAULT_SAMPLE_LINES};
use crate::snapshot::{BuildOptions, VolumeTable, MONTHS};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Where the monthly syslog exports live.
    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Where the statistics snapshot is written and read.
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Sampled-scan settings.
    #[serde(default)]
    pub scan: ScanConfig,

    /// Truncation limits applied when building the snapshot.
    #[serde(default)]
    pub aggregate: AggregateConfig,

    /// Per-month overrides of the estimated log volume, keyed `"1"`..`"12"`.
    #[serde(default)]
    pub volume: BTreeMap<String, u64>,

    /// Forecast tunables.
    #[serde(default)]
    pub forecast: ForecastConfig,
}

/// Corpus layout.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusConfig {
    /// Directory holding `01` .. `12` month subdirectories.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Regex matched against file names inside a month directory.
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Months to scan.
    #[serde(default = "default_months")]
    pub months: Vec<u8>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            file_pattern: default_file_pattern(),
            months: default_months(),
        }
    }
}

/// Snapshot location.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// Path of `stats.json`.
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

/// Sampled-scan settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Lines read per file in sampled mode.
    #[serde(default = "default_sample_lines")]
    pub sample_lines: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sample_lines: default_sample_lines(),
        }
    }
}

/// Truncation limits for the snapshot's top lists.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateConfig {
    /// Entries kept per month.
    #[serde(default = "default_top_n_small")]
    pub monthly_top_n: usize,

    /// Entries kept in the global top list.
    #[serde(default = "default_top_n_small")]
    pub global_top_n: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            monthly_top_n: default_top_n_small(),
            global_top_n: default_top_n_small(),
        }
    }
}

/// Forecast tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    /// Types forecast from the head of `top_types_summary`.
    #[serde(default = "default_forecast_top_n")]
    pub top_n: usize,

    /// Days past now to generate events for.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    /// Events generated per type at most.
    #[serde(default = "default_max_events_per_type")]
    pub max_events_per_type: usize,

    /// Hours spanned by the counted data. Must match the months that were
    /// actually aggregated, otherwise every MTBF is off by the same factor.
    #[serde(default = "default_window_hours")]
    pub window_hours: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            top_n: default_forecast_top_n(),
            horizon_days: default_horizon_days(),
            max_events_per_type: default_max_events_per_type(),
            window_hours: default_window_hours(),
        }
    }
}

impl Config {
    /// Validate that configuration values are within sane bounds.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.corpus.months.is_empty(),
            "corpus.months must not be empty"
        );
        anyhow::ensure!(
            self.corpus.months.iter().all(|m| MONTHS.contains(m)),
            "corpus.months must be within 1..=12"
        );
        regex::Regex::new(&self.corpus.file_pattern).with_context(|| {
            format!(
                "corpus.file_pattern {:?} is not a valid regex",
                self.corpus.file_pattern
            )
        })?;
        anyhow::ensure!(
            self.scan.sample_lines >= 1,
            "scan.sample_lines must be >= 1"
        );
        anyhow::ensure!(
            self.forecast.window_hours.is_finite() && self.forecast.window_hours > 0.0,
            "forecast.window_hours must be positive"
        );
        self.volume_table()?;
        Ok(())
    }

    /// The default volume table with this config's overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error if an override key is not a month number 1-12.
    pub fn volume_table(&self) -> anyhow::Result<VolumeTable> {
        let mut table = VolumeTable::default();
        for (key, volume) in &self.volume {
            let month: u8 = key
                .trim()
                .parse()
                .with_context(|| format!("volume key {key:?} is not a month number"))?;
            anyhow::ensure!(MONTHS.contains(&month), "volume key {key:?} is not in 1..=12");
            table.set(month, *volume);
        }
        Ok(table)
    }

    /// Snapshot build options.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume overrides are invalid.
    pub fn build_options(&self) -> anyhow::Result<BuildOptions> {
        Ok(BuildOptions {
            monthly_top_n: self.aggregate.monthly_top_n,
            global_top_n: self.aggregate.global_top_n,
            volumes: self.volume_table()?,
        })
    }

    /// Scanner options for the given mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file pattern does not compile.
    pub fn scan_options(&self, mode: ScanMode) -> anyhow::Result<ScanOptions> {
        ScanOptions::new(mode, &self.corpus.file_pattern).context("invalid corpus.file_pattern")
    }

    /// Sampled mode with the configured line cap.
    pub fn sampled_mode(&self) -> ScanMode {
        ScanMode::Sampled {
            max_lines: self.scan.sample_lines,
        }
    }

    /// Forecast parameters.
    pub fn forecast_params(&self) -> ForecastParams {
        ForecastParams {
            top_n: self.forecast.top_n,
            horizon_days: self.forecast.horizon_days,
            max_events_per_type: self.forecast.max_events_per_type,
            window_hours: self.forecast.window_hours,
        }
    }
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or fails validation.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration, falling back to defaults when the file is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or is invalid.
pub fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}

/// Resolve the default config directory (`~/.logcast/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".logcast"))
}

/// Default config file path (`~/.logcast/config.toml`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// Default value functions for serde.

fn default_root_dir() -> PathBuf {
    PathBuf::from("syslog")
}

fn default_file_pattern() -> String {
    DEFAULT_FILE_PATTERN.to_owned()
}

fn default_months() -> Vec<u8> {
    MONTHS.collect()
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("stats.json")
}

fn default_sample_lines() -> usize {
    DEFAULT_SAMPLE_LINES
}

fn default_top_n_small() -> usize {
    5
}

fn default_forecast_top_n() -> usize {
    15
}

fn default_horizon_days() -> u32 {
    30
}

fn default_max_events_per_type() -> usize {
    10
}

fn default_window_hours() -> f64 {
    DEFAULT_WINDOW_HOURS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").expect("should parse");
        assert_eq!(config.corpus.months, (1..=12).collect::<Vec<u8>>());
        assert_eq!(config.scan.sample_lines, 2000);
        assert_eq!(config.forecast.top_n, 15);
        assert!((config.forecast.window_hours - 5136.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_dir_resolves() {
        let dir = config_dir();
        assert!(dir.is_ok());
        let path = dir.expect("already checked");
        assert!(path.ends_with(".logcast"));
    }

    #[test]
    fn month_thirteen_is_rejected() {
        let config: Config = toml::from_str("[corpus]\nmonths = [1, 13]\n").expect("should parse");
        assert!(config.validate().is_err());
    }
}
