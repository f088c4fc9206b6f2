//! End-to-end operations: rebuild the snapshot, sample the corpus, and
//! answer dashboard and forecast requests from the persisted snapshot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::Aggregator;
use crate::forecast::{self, ForecastParams};
use crate::present::{DashboardView, ForecastResponse};
use crate::scanner::{self, ScanOptions};
use crate::snapshot::{self, BuildOptions, SnapshotError, StatsSnapshot};

/// Inputs to a rebuild.
#[derive(Debug, Clone)]
pub struct RebuildRequest {
    /// Corpus root holding the month directories.
    pub root: PathBuf,
    /// Where to write `stats.json`.
    pub output: PathBuf,
    /// Months to scan.
    pub months: Vec<u8>,
    /// File pattern and mode; rebuilds are expected to use full mode.
    pub scan: ScanOptions,
    /// Truncation limits and volume estimates.
    pub build: BuildOptions,
}

/// What a rebuild produced.
#[derive(Debug, Clone)]
pub struct RebuildSummary {
    /// The snapshot as written.
    pub snapshot: StatsSnapshot,
    /// Where it was written.
    pub output: PathBuf,
    /// Files scanned successfully.
    pub files_scanned: usize,
    /// Files skipped because they could not be read.
    pub failed_files: usize,
}

/// Scan the corpus, build the snapshot and publish it.
///
/// Per-file failures are logged and counted, never fatal.
///
/// # Errors
///
/// Returns [`SnapshotError::MonthOutOfRange`] before scanning anything if a
/// requested month is not 1-12, otherwise an error only if the snapshot
/// cannot be serialized or written.
pub async fn rebuild(
    request: &RebuildRequest,
    generated_at: NaiveDateTime,
) -> Result<RebuildSummary, SnapshotError> {
    if let Some(&month) = request.months.iter().find(|m| !snapshot::MONTHS.contains(*m)) {
        return Err(SnapshotError::MonthOutOfRange(month));
    }

    info!(
        root = %request.root.display(),
        months = ?request.months,
        "starting corpus analysis"
    );

    let tallies = scanner::scan_corpus(&request.root, &request.months, &request.scan).await;

    let mut agg = Aggregator::new();
    let mut files_scanned = 0usize;
    for tally in tallies {
        files_scanned = files_scanned.saturating_add(tally.files_scanned);
        agg.absorb(tally);
    }
    let failed_files = agg.failed_files();

    let snapshot = StatsSnapshot::build(&agg, &request.build, generated_at);
    for problem in snapshot.violations() {
        warn!(problem = %problem, "snapshot invariant violated");
    }

    snapshot::write_snapshot(&snapshot, &request.output)?;

    if failed_files > 0 {
        warn!(failed_files, "some files could not be read and were skipped");
    }
    info!(
        total_errors = snapshot.total_errors,
        files_scanned,
        "corpus analysis complete"
    );

    Ok(RebuildSummary {
        snapshot,
        output: request.output.clone(),
        files_scanned,
        failed_files,
    })
}

/// Result of a sampled scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleReport {
    /// Per-file line cap that was applied.
    pub lines_per_file: usize,
    /// Error events seen within the sample.
    pub total_errors: u64,
    /// Most frequent types within the sample.
    pub top_types: Vec<(String, u64)>,
    /// Per-day counts within the sample, keyed `YYYY-MM-DD`.
    pub daily_counts: BTreeMap<String, BTreeMap<String, u64>>,
}

/// Quick look at the corpus when no snapshot exists yet.
///
/// Reads at most `options`' line cap per file, so counts are a lower bound.
pub async fn sample(root: &Path, months: &[u8], options: &ScanOptions, top: usize) -> SampleReport {
    let lines_per_file = match options.mode {
        scanner::ScanMode::Sampled { max_lines } => max_lines,
        scanner::ScanMode::Full => usize::MAX,
    };

    let mut agg = Aggregator::new();
    for tally in scanner::scan_corpus(root, months, options).await {
        agg.absorb(tally);
    }

    let daily_counts = agg
        .daily()
        .iter()
        .map(|(day, tally)| (day.format("%Y-%m-%d").to_string(), tally.to_sorted_map()))
        .collect();

    SampleReport {
        lines_per_file,
        total_errors: agg.total_errors(),
        top_types: agg.global().top(top),
        daily_counts,
    }
}

/// Dashboard series from the persisted snapshot.
///
/// A missing snapshot yields an empty view rather than an error.
///
/// # Errors
///
/// Returns an error if the snapshot exists but cannot be read or parsed.
pub fn dashboard(path: &Path) -> Result<DashboardView, SnapshotError> {
    match snapshot::load_snapshot(path) {
        Ok(snapshot) => Ok(DashboardView::from_snapshot(&snapshot)),
        Err(SnapshotError::Missing(_)) => {
            warn!(path = %path.display(), "snapshot not found, returning empty dashboard");
            Ok(DashboardView::default())
        }
        Err(e) => Err(e),
    }
}

/// Forecast response from the persisted snapshot, anchored at the start of
/// `now`'s day.
///
/// # Errors
///
/// Returns an error if the snapshot exists but cannot be read or parsed.
/// A missing snapshot is reported inside the response envelope.
pub fn forecast_response(
    path: &Path,
    params: &ForecastParams,
    now: NaiveDateTime,
) -> Result<ForecastResponse, SnapshotError> {
    let snapshot = match snapshot::load_snapshot(path) {
        Ok(snapshot) => snapshot,
        Err(SnapshotError::Missing(_)) => return Ok(ForecastResponse::stats_not_found()),
        Err(e) => return Err(e),
    };

    let anchor = forecast::start_of_day(now);
    let timeline = forecast::forecast(&snapshot, params, anchor, now);
    Ok(ForecastResponse::from_timeline(&timeline))
}
