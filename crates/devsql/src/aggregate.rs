//! Per-request query collection and duplicate detection.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Milliseconds as a float, the unit used in records and log fields.
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// One executed statement, as seen by the request it ran in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRecord {
    /// SQL text with parameters substituted.
    pub sql: String,
    /// Wall-clock execution time in milliseconds (never negative).
    pub duration_ms: f64,
}

impl QueryRecord {
    /// Create a record from a measured duration.
    pub fn new(sql: impl Into<String>, duration: Duration) -> Self {
        Self {
            sql: sql.into(),
            duration_ms: duration_ms(duration),
        }
    }

    /// Create a record from a duration in milliseconds.
    ///
    /// Negative and NaN durations are clamped to zero.
    pub fn from_millis(sql: impl Into<String>, duration_ms: f64) -> Self {
        let duration_ms = if duration_ms.is_nan() {
            0.0
        } else {
            duration_ms.max(0.0)
        };
        Self {
            sql: sql.into(),
            duration_ms,
        }
    }
}

/// Counts reported at the end of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySummary {
    /// Number of statements executed.
    pub total_count: usize,
    /// Number of distinct SQL texts.
    pub unique_count: usize,
    /// `total_count - unique_count`.
    pub duplicate_count: usize,
    /// Sum of all statement durations.
    pub total_duration_ms: f64,
}

impl fmt::Display for QuerySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} queries with {} duplicates",
            self.total_count, self.duplicate_count
        )
    }
}

/// Summarize a batch of records.
///
/// Returns `None` for an empty batch: a request that ran no SQL has nothing
/// to report. Uniqueness is exact string equality on [`QueryRecord::sql`].
pub fn summarize(records: &[QueryRecord]) -> Option<QuerySummary> {
    if records.is_empty() {
        return None;
    }
    let unique: HashSet<&str> = records.iter().map(|r| r.sql.as_str()).collect();
    let total_count = records.len();
    Some(QuerySummary {
        total_count,
        unique_count: unique.len(),
        duplicate_count: total_count - unique.len(),
        total_duration_ms: records.iter().map(|r| r.duration_ms).sum(),
    })
}

/// Ordered statements executed during one request.
#[derive(Debug, Clone, Default)]
pub struct QueryBatch {
    records: Vec<QueryRecord>,
}

impl QueryBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn record(&mut self, record: QueryRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// See [`summarize`].
    pub fn summarize(&self) -> Option<QuerySummary> {
        summarize(&self.records)
    }

    pub fn into_records(self) -> Vec<QueryRecord> {
        self.records
    }
}
