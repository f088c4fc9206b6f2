//! JSON views consumed by the dashboard.
//!
//! The engine types carry raw values; this module owns display concerns
//! such as number formatting, tier labels and colour hints.

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use crate::forecast::{ForecastEvent, RiskTier};
use crate::snapshot::StatsSnapshot;

/// Display format for `next_est`.
const NEXT_EST_FORMAT: &str = "%Y-%m-%d %H:%M";

/// ISO 8601 with microseconds only when the fraction is non-zero.
fn iso_timestamp(at: NaiveDateTime) -> String {
    if at.nanosecond() == 0 {
        at.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// CSS class hint for a tier.
pub fn risk_color(tier: RiskTier) -> &'static str {
    match tier {
        RiskTier::Critical => "text-danger",
        RiskTier::High => "text-warning",
        RiskTier::Medium => "text-success",
    }
}

/// One row of the forecast timeline as rendered by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastView {
    /// ISO 8601 timestamp, used for client-side countdowns.
    pub timestamp_iso: String,
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Historical count.
    pub count: u64,
    /// MTBF, e.g. `"51.4h"`.
    pub mtbf: String,
    /// Predicted time, `YYYY-MM-DD HH:MM`.
    pub next_est: String,
    /// Tier label.
    pub risk: String,
    /// Colour hint for the tier.
    pub risk_color: String,
    /// 24-hour probability as a percentage, e.g. `"37.3%"`.
    pub prob_24h: String,
    /// Multiple of the MTBF from the anchor.
    pub occurrence_index: i64,
}

impl From<&ForecastEvent> for ForecastView {
    fn from(event: &ForecastEvent) -> Self {
        Self {
            timestamp_iso: iso_timestamp(event.next_occurrence),
            error_type: event.error_type.clone(),
            count: event.historical_count,
            mtbf: format!("{:.1}h", event.mtbf_hours),
            next_est: event.next_occurrence.format(NEXT_EST_FORMAT).to_string(),
            risk: event.risk_tier.label().to_owned(),
            risk_color: risk_color(event.risk_tier).to_owned(),
            prob_24h: format!("{:.1}%", event.probability_24h * 100.0),
            occurrence_index: event.occurrence_index,
        }
    }
}

/// Envelope returned by the forecast endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ForecastResponse {
    /// Forecast computed.
    Success {
        /// Timeline rows, ascending by time.
        data: Vec<ForecastView>,
    },
    /// Forecast unavailable.
    Error {
        /// Reason shown to the user.
        message: String,
    },
}

impl ForecastResponse {
    /// Wrap a computed timeline.
    pub fn from_timeline(timeline: &[ForecastEvent]) -> Self {
        Self::Success {
            data: timeline.iter().map(ForecastView::from).collect(),
        }
    }

    /// The response when no snapshot has been built yet.
    pub fn stats_not_found() -> Self {
        Self::Error {
            message: "Stats not found".to_owned(),
        }
    }
}

/// Month-by-month chart data plus the global top types.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardView {
    /// Chart labels, one per month.
    pub labels: Vec<String>,
    /// Error count per month.
    pub monthly_totals: Vec<u64>,
    /// Error percentage per month.
    pub monthly_ratios: Vec<f64>,
    /// Most frequent types overall.
    pub top_5: Vec<String>,
    /// Counts parallel to `top_5`.
    pub top_5_counts: Vec<u64>,
}

impl DashboardView {
    /// Project a snapshot into chart series.
    pub fn from_snapshot(snapshot: &StatsSnapshot) -> Self {
        Self {
            labels: snapshot
                .monthly
                .iter()
                .map(|m| month_label(m.month).to_owned())
                .collect(),
            monthly_totals: snapshot.monthly.iter().map(|m| m.errors).collect(),
            monthly_ratios: snapshot.monthly.iter().map(|m| m.percentage).collect(),
            top_5: snapshot.top_5_global.clone(),
            top_5_counts: snapshot.top_5_counts.clone(),
        }
    }
}

fn month_label(month: u8) -> &'static str {
    match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        12 => "Dec",
        _ => "?",
    }
}
