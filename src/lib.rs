//! logcast — syslog error statistics and failure forecasting.
//!
//! Scans a year of tab-separated syslog exports laid out one directory per
//! month, tallies error types per month and overall, persists the result as
//! `stats.json`, and extrapolates an MTBF-based timeline of upcoming errors
//! from that snapshot.
//!
//! See `DESIGN.md` for the module map.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Per-month and global error-type counters.
pub mod aggregate;
/// Error-line classification.
pub mod classifier;
/// Configuration loading and validation.
pub mod config;
/// MTBF forecast engine.
pub mod forecast;
/// Logging setup.
pub mod logging;
/// Rebuild, sample and serving operations.
pub mod pipeline;
/// Dashboard-facing JSON views.
pub mod present;
/// Month directory and file scanning.
pub mod scanner;
/// The persisted statistics snapshot.
pub mod snapshot;
