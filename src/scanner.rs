//! Corpus scanning: month directories, their text files, and line streaming.
//!
//! The corpus is laid out as `<root>/01` .. `<root>/12`, each holding a flat
//! set of exported text files. Reads use synchronous `std::fs` with a
//! buffered reader; [`scan_corpus`] moves each month onto a blocking worker.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use regex::Regex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::aggregate::MonthTally;
use crate::classifier;

/// Default file-name pattern for exported text files.
pub const DEFAULT_FILE_PATTERN: &str = r"(?i)\.txt$";

/// Default per-file line cap for sampled scans.
pub const DEFAULT_SAMPLE_LINES: usize = 2000;

/// Errors raised while scanning the corpus.
///
/// These never abort a scan on their own; callers log them and move on.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The month directory exists but could not be listed.
    #[error("failed to list {}: {source}", path.display())]
    ListDir {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A file could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A read failed part-way through a file.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The configured file-name pattern is not a valid regex.
    #[error("invalid file pattern {pattern:?}: {source}")]
    Pattern {
        /// Pattern as configured.
        pattern: String,
        /// Regex compile error.
        source: regex::Error,
    },
}

/// How much of each file to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Every line of every file. Used when rebuilding the snapshot.
    Full,
    /// At most `max_lines` lines per file. Trades accuracy for latency on
    /// the serving path; counts from a sampled scan undercount large files.
    Sampled {
        /// Per-file line cap.
        max_lines: usize,
    },
}

impl ScanMode {
    fn line_cap(self) -> Option<usize> {
        match self {
            Self::Full => None,
            Self::Sampled { max_lines } => Some(max_lines),
        }
    }
}

/// Options shared by all month workers.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Full or sampled reading.
    pub mode: ScanMode,
    /// Files whose name matches are scanned; everything else is ignored.
    pub file_pattern: Regex,
}

impl ScanOptions {
    /// Build options from a mode and a file-name regex.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Pattern`] if the regex does not compile.
    pub fn new(mode: ScanMode, file_pattern: &str) -> Result<Self, ScanError> {
        let file_pattern = Regex::new(file_pattern).map_err(|source| ScanError::Pattern {
            pattern: file_pattern.to_owned(),
            source,
        })?;
        Ok(Self { mode, file_pattern })
    }

    /// Full-mode options with the default `.txt` pattern.
    pub fn full() -> Self {
        Self {
            mode: ScanMode::Full,
            file_pattern: default_pattern(),
        }
    }

    /// Sampled-mode options with the default `.txt` pattern.
    pub fn sampled(max_lines: usize) -> Self {
        Self {
            mode: ScanMode::Sampled { max_lines },
            file_pattern: default_pattern(),
        }
    }
}

fn default_pattern() -> Regex {
    Regex::new(DEFAULT_FILE_PATTERN).expect("default file pattern is a valid regex")
}

/// Directory for a month: `<root>/<MM>`.
pub fn month_dir(root: &Path, month: u8) -> PathBuf {
    root.join(format!("{month:02}"))
}

/// List the files in `dir` whose name matches `pattern`, sorted by path.
///
/// Non-recursive; subdirectories and dangling links are skipped.
///
/// # Errors
///
/// Returns [`ScanError::ListDir`] if the directory cannot be read.
pub fn list_month_files(dir: &Path, pattern: &Regex) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(dir).map_err(|source| ScanError::ListDir {
        path: dir.to_owned(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        // Follows symlinks, so linked exports are scanned like regular files.
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| pattern.is_match(n))
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Stream one file into `tally`.
///
/// Lines are decoded lossily so invalid UTF-8 never fails the read.
/// Returns the number of lines consumed.
///
/// # Errors
///
/// Returns [`ScanError::Open`] or [`ScanError::Read`]. Events counted
/// before a mid-file read error stay in `tally`.
pub fn scan_file(
    path: &Path,
    month: u8,
    mode: ScanMode,
    tally: &mut MonthTally,
) -> Result<usize, ScanError> {
    let file = fs::File::open(path).map_err(|source| ScanError::Open {
        path: path.to_owned(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let cap = mode.line_cap();
    let mut buf = Vec::new();
    let mut lines = 0usize;

    loop {
        if cap.is_some_and(|max| lines >= max) {
            break;
        }

        buf.clear();
        let bytes_read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| ScanError::Read {
                path: path.to_owned(),
                source,
            })?;
        if bytes_read == 0 {
            break;
        }
        lines = lines.saturating_add(1);

        let line = String::from_utf8_lossy(&buf);
        if let Some(event) = classifier::classify(&line, month) {
            tally.record(&event);
        }
    }

    Ok(lines)
}

/// Scan every matching file in one month directory.
///
/// A missing directory yields an empty tally. A file that fails is logged
/// and counted in [`MonthTally::failed_files`]; its siblings are still
/// scanned.
pub fn scan_month(root: &Path, month: u8, options: &ScanOptions) -> MonthTally {
    let mut tally = MonthTally::empty(month);
    let dir = month_dir(root, month);

    if !dir.is_dir() {
        info!(month, dir = %dir.display(), "month directory not found, counting as empty");
        return tally;
    }

    let files = match list_month_files(&dir, &options.file_pattern) {
        Ok(files) => files,
        Err(e) => {
            warn!(month, error = %e, "skipping unreadable month directory");
            return tally;
        }
    };

    info!(month, files = files.len(), "scanning month");

    for path in &files {
        match scan_file(path, month, options.mode, &mut tally) {
            Ok(lines) => {
                tally.files_scanned = tally.files_scanned.saturating_add(1);
                debug!(file = %path.display(), lines, "file scanned");
            }
            Err(e) => {
                tally.failed_files = tally.failed_files.saturating_add(1);
                warn!(file = %path.display(), error = %e, "skipping file");
            }
        }
    }

    tally
}

/// Scan the requested months in parallel, one blocking worker per month.
///
/// The result has one tally per distinct requested month, in ascending
/// month order regardless of worker completion order. A worker that panics
/// is logged and its month reported as empty.
pub async fn scan_corpus(root: &Path, months: &[u8], options: &ScanOptions) -> Vec<MonthTally> {
    let wanted: BTreeSet<u8> = months.iter().copied().collect();
    let mut workers = JoinSet::new();

    for &month in &wanted {
        let root = root.to_owned();
        let options = options.clone();
        workers.spawn_blocking(move || scan_month(&root, month, &options));
    }

    let mut done: BTreeMap<u8, MonthTally> = BTreeMap::new();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(tally) => {
                done.insert(tally.month, tally);
            }
            Err(e) => warn!(error = %e, "month worker failed"),
        }
    }

    wanted
        .into_iter()
        .map(|m| done.remove(&m).unwrap_or_else(|| MonthTally::empty(m)))
        .collect()
}
