//! MTBF-based forecast of upcoming error occurrences.
//!
//! For each of the most frequent error types the mean time between failures
//! is the historical window divided by the type's count. Occurrences are
//! then assumed to be strictly periodic at multiples of the MTBF from a
//! fixed anchor (midnight by default), which keeps the timeline stable
//! across repeated requests on the same day. This is a deterministic
//! extrapolation, not a statistical fit: real arrivals are bursty and the
//! timeline only conveys expected cadence.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::snapshot::StatsSnapshot;

/// Hours in the May through November window the counts were collected over
/// (214 days).
pub const DEFAULT_WINDOW_HOURS: f64 = 5136.0;

/// MTBF below this many hours is [`RiskTier::Critical`].
pub const CRITICAL_MTBF_HOURS: f64 = 24.0;

/// MTBF below this many hours (one week) is [`RiskTier::High`].
pub const HIGH_MTBF_HOURS: f64 = 168.0;

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// Tunables for a forecast request.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastParams {
    /// How many entries of `top_types_summary` to forecast. Types past this
    /// cutoff are ignored entirely.
    pub top_n: usize,
    /// How far past `now` to generate events.
    pub horizon_days: u32,
    /// Upper bound on events per type.
    pub max_events_per_type: usize,
    /// Hours spanned by the data the snapshot counts were taken from.
    pub window_hours: f64,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            top_n: 15,
            horizon_days: 30,
            max_events_per_type: 10,
            window_hours: DEFAULT_WINDOW_HOURS,
        }
    }
}

/// Risk classification by MTBF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// Expected more than once a day.
    Critical,
    /// Expected more than once a week.
    High,
    /// Weekly or rarer.
    Medium,
}

impl RiskTier {
    /// Classify an MTBF in hours. Boundaries are strict: exactly 24h is High.
    pub fn from_mtbf(mtbf_hours: f64) -> Self {
        if mtbf_hours < CRITICAL_MTBF_HOURS {
            Self::Critical
        } else if mtbf_hours < HIGH_MTBF_HOURS {
            Self::High
        } else {
            Self::Medium
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL (Daily)",
            Self::High => "HIGH (Weekly)",
            Self::Medium => "MEDIUM (Monthly+)",
        }
    }
}

/// One predicted occurrence of an error type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEvent {
    /// Error type.
    pub error_type: String,
    /// Count of the type in the snapshot.
    pub historical_count: u64,
    /// Mean time between failures, in hours.
    pub mtbf_hours: f64,
    /// Predicted time of this occurrence.
    pub next_occurrence: NaiveDateTime,
    /// Risk tier derived from `mtbf_hours`.
    pub risk_tier: RiskTier,
    /// Probability of at least one occurrence within 24 hours.
    pub probability_24h: f64,
    /// Multiple of the MTBF from the anchor.
    pub occurrence_index: i64,
}

/// Mean time between failures in hours, or `None` for a zero count.
pub fn mtbf_hours(window_hours: f64, count: u64) -> Option<f64> {
    if count == 0 {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let mtbf = window_hours / count as f64;
    Some(mtbf)
}

/// Probability of at least one event within `hours`, assuming exponential
/// inter-arrival times with mean `mtbf_hours`. Zero for a non-positive MTBF.
pub fn probability_within(hours: f64, mtbf_hours: f64) -> f64 {
    if mtbf_hours <= 0.0 {
        return 0.0;
    }
    1.0 - (-hours / mtbf_hours).exp()
}

/// Midnight at the start of `now`'s date.
pub fn start_of_day(now: NaiveDateTime) -> NaiveDateTime {
    now.date().and_time(chrono::NaiveTime::MIN)
}

/// Build the forecast timeline.
///
/// Pure in its inputs: `anchor` and `now` are supplied by the caller, so the
/// same arguments always give the same timeline. Types with a zero count
/// are removed before any MTBF is computed. The result is ascending by
/// `next_occurrence`; events at the same instant keep the count-descending
/// order of `top_types_summary`.
pub fn forecast(
    snapshot: &StatsSnapshot,
    params: &ForecastParams,
    anchor: NaiveDateTime,
    now: NaiveDateTime,
) -> Vec<ForecastEvent> {
    let horizon_end = now
        .checked_add_signed(Duration::days(i64::from(params.horizon_days)))
        .unwrap_or(NaiveDateTime::MAX);
    let elapsed = hours_between(anchor, now);

    let mut timeline = Vec::new();

    for (error_type, count) in snapshot
        .top_types_summary
        .iter()
        .take(params.top_n)
        .filter(|(_, count)| *count > 0)
    {
        let Some(mtbf) = mtbf_hours(params.window_hours, *count) else {
            continue;
        };
        if !mtbf.is_finite() || mtbf <= 0.0 {
            continue;
        }

        let risk_tier = RiskTier::from_mtbf(mtbf);
        let probability_24h = probability_within(24.0, mtbf);

        #[allow(clippy::cast_possible_truncation)]
        let start = ((elapsed / mtbf).floor() as i64).saturating_add(1);

        let mut n = start;
        for _ in 0..params.max_events_per_type {
            let Some(at) = occurrence_at(anchor, n, mtbf) else {
                break;
            };
            if at > horizon_end {
                break;
            }

            timeline.push(ForecastEvent {
                error_type: error_type.clone(),
                historical_count: *count,
                mtbf_hours: mtbf,
                next_occurrence: at,
                risk_tier,
                probability_24h,
                occurrence_index: n,
            });
            n = n.saturating_add(1);
        }
    }

    timeline.sort_by_key(|e| e.next_occurrence);
    timeline
}

/// `anchor + n * mtbf_hours`, to microsecond precision.
fn occurrence_at(anchor: NaiveDateTime, n: i64, mtbf_hours: f64) -> Option<NaiveDateTime> {
    #[allow(clippy::cast_precision_loss)]
    let micros = (n as f64 * mtbf_hours * MICROS_PER_HOUR).round();

    #[allow(clippy::cast_precision_loss)]
    let in_range = micros.is_finite() && micros.abs() < i64::MAX as f64;
    if !in_range {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)]
    let offset = Duration::microseconds(micros as i64);
    anchor.checked_add_signed(offset)
}

fn hours_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to.signed_duration_since(from);

    #[allow(clippy::cast_precision_loss)]
    let hours = match delta.num_microseconds() {
        Some(us) => us as f64 / MICROS_PER_HOUR,
        None => delta.num_seconds() as f64 / 3600.0,
    };
    hours
}
