//! Error-type counters for a single month and for the whole corpus.
//!
//! Counters keep first-seen order so that ranking ties resolve the same way
//! on every run. Merging is plain counter addition; as long as tallies are
//! merged in month order the result does not depend on which worker
//! finished first.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::classifier::ErrorEvent;

/// Insertion-ordered `error type -> count` counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeTally {
    order: Vec<String>,
    counts: HashMap<String, u64>,
}

impl TypeTally {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `error_type`.
    pub fn record(&mut self, error_type: &str) {
        self.add(error_type, 1);
    }

    /// Add `count` occurrences of `error_type`.
    pub fn add(&mut self, error_type: &str, count: u64) {
        match self.counts.get_mut(error_type) {
            Some(existing) => *existing = existing.saturating_add(count),
            None => {
                self.order.push(error_type.to_owned());
                self.counts.insert(error_type.to_owned(), count);
            }
        }
    }

    /// Fold another tally into this one.
    ///
    /// Types new to `self` are appended in `other`'s first-seen order.
    pub fn merge(&mut self, other: &TypeTally) {
        for error_type in &other.order {
            let count = other.counts.get(error_type).copied().unwrap_or(0);
            self.add(error_type, count);
        }
    }

    /// Count for a single type (0 if never seen).
    pub fn get(&self, error_type: &str) -> u64 {
        self.counts.get(error_type).copied().unwrap_or(0)
    }

    /// Number of distinct types.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing has been counted.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts
            .values()
            .fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    /// All `(type, count)` pairs, descending by count, ties in first-seen order.
    pub fn ranked(&self) -> Vec<(String, u64)> {
        let mut ranked: Vec<(String, u64)> = self
            .order
            .iter()
            .map(|t| (t.clone(), self.get(t)))
            .collect();
        // Stable sort keeps first-seen order among equal counts.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// The first `n` entries of [`ranked`](Self::ranked).
    ///
    /// Everything past `n` is dropped; callers that need the full
    /// distribution must use `ranked` instead.
    pub fn top(&self, n: usize) -> Vec<(String, u64)> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }

    /// Counts keyed by type in sorted key order.
    pub fn to_sorted_map(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

/// Per-day error counts keyed by calendar date, then type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyTally {
    days: BTreeMap<NaiveDate, TypeTally>,
}

impl DailyTally {
    /// Count an event under its date. Events without a timestamp are ignored.
    pub fn record(&mut self, event: &ErrorEvent) {
        if let Some(ts) = event.timestamp {
            self.days
                .entry(ts.date())
                .or_default()
                .record(&event.error_type);
        }
    }

    /// Fold another daily tally into this one.
    pub fn merge(&mut self, other: &DailyTally) {
        for (day, tally) in &other.days {
            self.days.entry(*day).or_default().merge(tally);
        }
    }

    /// Tally for a single day.
    pub fn day(&self, date: NaiveDate) -> Option<&TypeTally> {
        self.days.get(&date)
    }

    /// Number of days with at least one event.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Whether no day has been recorded.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Iterate days in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &TypeTally)> {
        self.days.iter()
    }
}

/// Everything counted for one month directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthTally {
    /// Month number, 1-12.
    pub month: u8,
    /// Number of error events.
    pub errors: u64,
    /// Per-type counts for this month.
    pub types: TypeTally,
    /// Per-day counts for this month.
    pub daily: DailyTally,
    /// Files that were read to completion (or to the sample cap).
    pub files_scanned: usize,
    /// Files that failed to open or read.
    pub failed_files: usize,
}

impl MonthTally {
    /// An empty tally for `month`.
    pub fn empty(month: u8) -> Self {
        Self {
            month,
            ..Self::default()
        }
    }

    /// Count one classified event.
    pub fn record(&mut self, event: &ErrorEvent) {
        self.errors = self.errors.saturating_add(1);
        self.types.record(&event.error_type);
        self.daily.record(event);
    }

    /// Fold the counts of a partial tally for the same month.
    pub fn merge(&mut self, other: &MonthTally) {
        self.errors = self.errors.saturating_add(other.errors);
        self.types.merge(&other.types);
        self.daily.merge(&other.daily);
        self.files_scanned = self.files_scanned.saturating_add(other.files_scanned);
        self.failed_files = self.failed_files.saturating_add(other.failed_files);
    }
}

/// Corpus-wide accumulator with a single owner.
///
/// Month tallies are absorbed one by one; the aggregator keeps them ordered
/// by month and folds their type counts into the global tally.
#[derive(Debug, Default)]
pub struct Aggregator {
    months: BTreeMap<u8, MonthTally>,
    global: TypeTally,
    total_errors: u64,
}

impl Aggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb a month tally. A second tally for the same month is merged.
    pub fn absorb(&mut self, tally: MonthTally) {
        self.total_errors = self.total_errors.saturating_add(tally.errors);
        self.global.merge(&tally.types);
        match self.months.get_mut(&tally.month) {
            Some(existing) => existing.merge(&tally),
            None => {
                self.months.insert(tally.month, tally);
            }
        }
    }

    /// Total error events absorbed so far.
    pub fn total_errors(&self) -> u64 {
        self.total_errors
    }

    /// Global per-type tally.
    pub fn global(&self) -> &TypeTally {
        &self.global
    }

    /// Tally for a given month, if one was absorbed.
    pub fn month(&self, month: u8) -> Option<&MonthTally> {
        self.months.get(&month)
    }

    /// Number of files that failed across all months.
    pub fn failed_files(&self) -> usize {
        self.months
            .values()
            .fold(0usize, |acc, m| acc.saturating_add(m.failed_files))
    }

    /// Daily counts merged across all months.
    pub fn daily(&self) -> DailyTally {
        let mut daily = DailyTally::default();
        for tally in self.months.values() {
            daily.merge(&tally.daily);
        }
        daily
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_breaks_ties_by_first_seen() {
        let mut tally = TypeTally::new();
        tally.record("B");
        tally.record("A");
        tally.record("C");
        tally.record("C");
        let ranked = tally.ranked();
        assert_eq!(
            ranked,
            vec![("C".to_owned(), 2), ("B".to_owned(), 1), ("A".to_owned(), 1)]
        );
    }

    #[test]
    fn merge_is_counter_addition() {
        let mut a = TypeTally::new();
        a.add("X", 3);
        let mut b = TypeTally::new();
        b.add("Y", 2);
        b.add("X", 1);
        a.merge(&b);
        assert_eq!(a.get("X"), 4);
        assert_eq!(a.get("Y"), 2);
        assert_eq!(a.total(), 6);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn top_truncates() {
        let mut tally = TypeTally::new();
        for (i, name) in ["a", "b", "c", "d", "e", "f", "g"].iter().enumerate() {
            tally.add(name, u64::try_from(i).unwrap_or(0).saturating_add(1));
        }
        let top = tally.top(5);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0], ("g".to_owned(), 7));
    }
}
