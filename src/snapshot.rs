//! The persisted statistics snapshot (`stats.json`).
//!
//! A snapshot is built once per rebuild from the aggregated month tallies
//! and written atomically. Readers load it on demand; they never see a
//! partially written file because the writer publishes by rename.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{Aggregator, MonthTally};

/// Months covered by a snapshot, always in this order.
pub const MONTHS: std::ops::RangeInclusive<u8> = 1..=12;

/// Volume assumed for a month missing from a [`VolumeTable`].
pub const FALLBACK_MONTHLY_VOLUME: u64 = 1_000_000;

/// Estimated total log lines per month, used as the percentage denominator.
const DEFAULT_VOLUMES: [(u8, u64); 12] = [
    (1, 4_500_000),
    (2, 4_200_000),
    (3, 4_600_000),
    (4, 4_300_000),
    (5, 4_100_000),
    (6, 2_800_000),
    (7, 3_500_000),
    (8, 3_200_000),
    (9, 6_800_000),
    (10, 7_200_000),
    (11, 7_500_000),
    (12, 2_500_000),
];

/// Errors reading or writing a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// No snapshot has been written yet. The corpus needs a rebuild.
    #[error("no snapshot at {}; run a rebuild first", .0.display())]
    Missing(PathBuf),
    /// Filesystem failure.
    #[error("snapshot I/O failed at {}: {source}", path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file exists but is not a valid snapshot.
    #[error("failed to parse snapshot at {}: {source}", path.display())]
    Parse {
        /// Path involved.
        path: PathBuf,
        /// JSON error.
        source: serde_json::Error,
    },
    /// The snapshot could not be serialized.
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),
    /// A requested month is outside 1-12 and has no slot in the snapshot.
    #[error("month {0} is outside 1..=12")]
    MonthOutOfRange(u8),
}

/// Per-month summary line in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStat {
    /// Month number, 1-12.
    pub month: u8,
    /// Error events counted in the month.
    pub errors: u64,
    /// Distinct error types in the month.
    pub unique_types: u64,
    /// `errors / estimated volume * 100`, rounded to 4 decimals.
    pub percentage: f64,
    /// Most frequent types, descending. Truncated: the remaining per-month
    /// breakdown is not kept, so these counts need not sum to `errors`.
    pub top_types: Vec<(String, u64)>,
}

impl MonthlyStat {
    /// A zero-activity entry, used for months without a directory.
    pub fn empty(month: u8) -> Self {
        Self {
            month,
            errors: 0,
            unique_types: 0,
            percentage: 0.0,
            top_types: Vec::new(),
        }
    }
}

/// The persisted statistics snapshot. Field names are part of the file
/// format consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// When the snapshot was built (local time, ISO 8601).
    pub generated_at: NaiveDateTime,
    /// Error events across all months.
    pub total_errors: u64,
    /// Full per-type counts across all months.
    pub global_type_counts: BTreeMap<String, u64>,
    /// Names of the most frequent types.
    pub top_5_global: Vec<String>,
    /// Counts parallel to `top_5_global`.
    pub top_5_counts: Vec<u64>,
    /// Every type with its count, descending.
    pub top_types_summary: Vec<(String, u64)>,
    /// Exactly twelve entries, months 1 through 12.
    pub monthly: Vec<MonthlyStat>,
}

/// Estimated total log volume per month.
///
/// Counting every line of a full year is too slow to do on each rebuild,
/// so the percentage uses these estimates as its denominator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeTable {
    volumes: BTreeMap<u8, u64>,
}

impl Default for VolumeTable {
    fn default() -> Self {
        Self {
            volumes: DEFAULT_VOLUMES.iter().copied().collect(),
        }
    }
}

impl VolumeTable {
    /// A table with no entries; every month uses the fallback.
    pub fn empty() -> Self {
        Self {
            volumes: BTreeMap::new(),
        }
    }

    /// Replace the estimate for one month.
    pub fn set(&mut self, month: u8, volume: u64) {
        self.volumes.insert(month, volume);
    }

    /// Estimated volume for `month`.
    pub fn get(&self, month: u8) -> u64 {
        self.volumes
            .get(&month)
            .copied()
            .unwrap_or(FALLBACK_MONTHLY_VOLUME)
    }

    /// Error percentage of the month's estimated volume, 4 decimals.
    pub fn percentage(&self, month: u8, errors: u64) -> f64 {
        let volume = self.get(month);
        if volume == 0 {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let pct = errors as f64 / volume as f64 * 100.0;
        round4(pct)
    }
}

/// Truncation limits and volume estimates applied when building.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Entries kept in each month's `top_types`.
    pub monthly_top_n: usize,
    /// Entries kept in `top_5_global` / `top_5_counts`.
    pub global_top_n: usize,
    /// Percentage denominators.
    pub volumes: VolumeTable,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            monthly_top_n: 5,
            global_top_n: 5,
            volumes: VolumeTable::default(),
        }
    }
}

impl StatsSnapshot {
    /// Build a snapshot from everything the aggregator has absorbed.
    ///
    /// Months the aggregator never saw are emitted as zero entries, so the
    /// result always has twelve months in order.
    pub fn build(agg: &Aggregator, options: &BuildOptions, generated_at: NaiveDateTime) -> Self {
        let monthly = MONTHS
            .map(|m| match agg.month(m) {
                Some(tally) => monthly_stat(tally, options),
                None => MonthlyStat::empty(m),
            })
            .collect();

        let top_types_summary = agg.global().ranked();
        let (top_5_global, top_5_counts): (Vec<String>, Vec<u64>) = top_types_summary
            .iter()
            .take(options.global_top_n)
            .cloned()
            .unzip();

        Self {
            generated_at,
            total_errors: agg.total_errors(),
            global_type_counts: agg.global().to_sorted_map(),
            top_5_global,
            top_5_counts,
            top_types_summary,
            monthly,
        }
    }

    /// Check the cross-field invariants of the snapshot.
    ///
    /// Returns a description of every violated invariant; empty if sound.
    pub fn violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let monthly_sum = self
            .monthly
            .iter()
            .fold(0u64, |acc, m| acc.saturating_add(m.errors));
        if monthly_sum != self.total_errors {
            problems.push(format!(
                "monthly errors sum to {monthly_sum}, total_errors is {}",
                self.total_errors
            ));
        }

        let global_sum = self
            .global_type_counts
            .values()
            .fold(0u64, |acc, c| acc.saturating_add(*c));
        if global_sum != self.total_errors {
            problems.push(format!(
                "global_type_counts sum to {global_sum}, total_errors is {}",
                self.total_errors
            ));
        }

        let months: Vec<u8> = self.monthly.iter().map(|m| m.month).collect();
        if months != MONTHS.collect::<Vec<_>>() {
            problems.push(format!("monthly entries are {months:?}, expected 1..=12"));
        }

        if self.top_5_global.len() != self.top_5_counts.len() {
            problems.push("top_5_global and top_5_counts differ in length".to_owned());
        }

        let head_matches = self
            .top_5_global
            .iter()
            .zip(&self.top_5_counts)
            .zip(&self.top_types_summary)
            .all(|((name, count), (s_name, s_count))| name == s_name && count == s_count);
        if !head_matches {
            problems.push("top_5_global does not match head of top_types_summary".to_owned());
        }

        problems
    }
}

fn monthly_stat(tally: &MonthTally, options: &BuildOptions) -> MonthlyStat {
    MonthlyStat {
        month: tally.month,
        errors: tally.errors,
        unique_types: u64::try_from(tally.types.len()).unwrap_or(u64::MAX),
        percentage: options.volumes.percentage(tally.month, tally.errors),
        top_types: tally.types.top(options.monthly_top_n),
    }
}

/// Round to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Serialize a snapshot as 4-space indented JSON.
///
/// # Errors
///
/// Returns [`SnapshotError::Serialize`] on serialization failure.
pub fn to_pretty_json(snapshot: &StatsSnapshot) -> Result<Vec<u8>, SnapshotError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    snapshot
        .serialize(&mut ser)
        .map_err(SnapshotError::Serialize)?;
    Ok(buf)
}

/// Write the snapshot atomically, replacing any previous one.
///
/// Writes to `<file>.tmp` in the same directory, then renames over the
/// target. Creates the parent directory if needed.
///
/// # Errors
///
/// Returns an error if serialization fails or the output location is not
/// writable.
pub fn write_snapshot(snapshot: &StatsSnapshot, path: &Path) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: path.to_owned(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = to_pretty_json(snapshot)?;
    let tmp_path = tmp_path_for(path);

    let published = write_synced(&tmp_path, &json).and_then(|()| fs::rename(&tmp_path, path));
    if let Err(source) = published {
        if let Err(e) = fs::remove_file(&tmp_path) {
            debug!(path = %tmp_path.display(), error = %e, "temp snapshot not removed");
        }
        return Err(io_err(source));
    }

    info!(path = %path.display(), total_errors = snapshot.total_errors, "snapshot written");
    Ok(())
}

fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Load a snapshot from disk.
///
/// # Errors
///
/// Returns [`SnapshotError::Missing`] if nothing has been written at
/// `path`, distinct from read and parse failures.
pub fn load_snapshot(path: &Path) -> Result<StatsSnapshot, SnapshotError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SnapshotError::Missing(path.to_owned()));
        }
        Err(source) => {
            return Err(SnapshotError::Io {
                path: path.to_owned(),
                source,
            })
        }
    };

    let snapshot: StatsSnapshot =
        serde_json::from_str(&contents).map_err(|source| SnapshotError::Parse {
            path: path.to_owned(),
            source,
        })?;

    debug!(path = %path.display(), generated_at = %snapshot.generated_at, "snapshot loaded");
    Ok(snapshot)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "stats.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
