use super::types::{QueryContext, QueryResult};
use crate::aggregate::{QuerySummary, duration_ms};
use std::time::Duration;
use tracing::Level;

/// A logged statement, after filtering, truncation and formatting.
#[derive(Debug, Clone, Copy)]
pub struct SqlEvent<'a> {
    /// The SQL text to show.
    pub message: &'a str,
    pub ctx: &'a QueryContext,
    pub duration: Duration,
    pub result: &'a QueryResult,
}

/// Where log output goes.
///
/// Monitors are handed a sink instead of writing to a global logger, so a
/// request's output can be routed (or captured in tests) per instance.
pub trait LogSink: Send + Sync {
    /// A statement finished.
    fn sql(&self, event: &SqlEvent<'_>);

    /// A statement exceeded the slow query threshold.
    fn slow(&self, _message: &str, _ctx: &QueryContext, _duration: Duration) {}

    /// A request finished after running at least one statement.
    fn summary(&self, summary: &QuerySummary, request_id: Option<&str>);
}

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// A [`LogSink`] that emits `tracing` events.
///
/// Statements go to target `devsql.sql`, summaries to `devsql.summary`.
#[derive(Debug, Clone)]
pub struct TracingSink {
    /// Level for statement events.
    pub sql_level: Level,
    /// Level for slow query events.
    pub slow_level: Level,
    /// Level for summary events.
    pub summary_level: Level,
}

impl Default for TracingSink {
    fn default() -> Self {
        Self {
            sql_level: Level::DEBUG,
            slow_level: Level::WARN,
            summary_level: Level::INFO,
        }
    }
}

impl TracingSink {
    /// Create a new sink with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the statement event level.
    pub fn sql_level(mut self, level: Level) -> Self {
        self.sql_level = level;
        self
    }

    /// Override the summary event level.
    pub fn summary_level(mut self, level: Level) -> Self {
        self.summary_level = level;
        self
    }
}

impl LogSink for TracingSink {
    fn sql(&self, event: &SqlEvent<'_>) {
        let ctx = event.ctx;
        let tag = ctx.tag.as_deref().unwrap_or("-");
        let duration_ms = duration_ms(event.duration);
        let rowcount = event.result.row_count();

        if let Some(times) = ctx.executions {
            emit_at_level!(
                self.sql_level,
                target: "devsql.sql",
                query_type = ?ctx.query_type,
                tag,
                duration_ms,
                "Executed {times} times\n{}",
                event.message,
            );
            match rowcount {
                Some(rows) => emit_at_level!(
                    self.sql_level,
                    target: "devsql.sql",
                    tag,
                    duration_ms,
                    "Found {rows} matching rows",
                ),
                None => emit_at_level!(
                    self.sql_level,
                    target: "devsql.sql",
                    tag,
                    duration_ms,
                    "{}",
                    event.result,
                ),
            }
            return;
        }

        match event.result {
            QueryResult::Error(error) => emit_at_level!(
                self.sql_level,
                target: "devsql.sql",
                query_type = ?ctx.query_type,
                tag,
                duration_ms,
                error = %error,
                "{}",
                event.message,
            ),
            _ => emit_at_level!(
                self.sql_level,
                target: "devsql.sql",
                query_type = ?ctx.query_type,
                tag,
                duration_ms,
                rowcount = ?rowcount,
                "{}",
                event.message,
            ),
        }
    }

    fn slow(&self, message: &str, ctx: &QueryContext, duration: Duration) {
        emit_at_level!(
            self.slow_level,
            target: "devsql.sql",
            query_type = ?ctx.query_type,
            tag = ctx.tag.as_deref().unwrap_or("-"),
            duration_ms = duration_ms(duration),
            "SLOW QUERY: {message}",
        );
    }

    fn summary(&self, summary: &QuerySummary, request_id: Option<&str>) {
        emit_at_level!(
            self.summary_level,
            target: "devsql.summary",
            request_id = request_id.unwrap_or("-"),
            calls = summary.total_count,
            dupes = summary.duplicate_count,
            duration_ms = summary.total_duration_ms,
            "{summary}",
        );
    }
}
