//! Line classification for tab-separated syslog exports.
//!
//! Each exported line carries at least nine tab-separated fields. Only four
//! of them matter here:
//!
//! | index | meaning                           |
//! |-------|-----------------------------------|
//! | 2     | severity (`err`, `info`, ...)     |
//! | 5     | timestamp, `YYYY-MM-DD HH:MM:SS`  |
//! | 7     | error type                        |
//! | 8     | message                           |

use chrono::NaiveDateTime;

/// Minimum number of tab-separated fields for a line to be considered.
pub const MIN_FIELDS: usize = 9;

const SEVERITY_FIELD: usize = 2;
const TIMESTAMP_FIELD: usize = 5;
const TYPE_FIELD: usize = 7;
const MESSAGE_FIELD: usize = 8;

/// Timestamp layout used by the syslog exporter.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single error line, classified and split into its meaningful fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Error type taken from field 7.
    pub error_type: String,
    /// Parsed timestamp from field 5, if it was well formed.
    pub timestamp: Option<NaiveDateTime>,
    /// Message body from field 8.
    pub message: String,
    /// Month (1-12) of the directory the line was read from.
    pub month: u8,
}

/// Whether a severity field denotes an error.
///
/// The rule is a case-insensitive substring test for `"err"`, so any
/// severity token containing those letters qualifies.
pub fn is_error_severity(field: &str) -> bool {
    field.to_lowercase().contains("err")
}

/// Classify a raw line read from the given month's directory.
///
/// Returns `None` for lines with fewer than [`MIN_FIELDS`] fields and for
/// non-error lines. An unparsable timestamp does not reject the event.
pub fn classify(line: &str, month: u8) -> Option<ErrorEvent> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    if !is_error_severity(fields[SEVERITY_FIELD]) {
        return None;
    }

    Some(ErrorEvent {
        error_type: fields[TYPE_FIELD].to_owned(),
        timestamp: parse_timestamp(fields[TIMESTAMP_FIELD]),
        message: fields[MESSAGE_FIELD].trim_end_matches(['\r', '\n']).to_owned(),
        month,
    })
}

/// Parse the exporter timestamp, tolerating surrounding whitespace.
///
/// Falls back to a bare `YYYY-MM-DD` date at midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT) {
        return Some(ts);
    }

    let date_part = trimmed.split_whitespace().next()?;
    chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
