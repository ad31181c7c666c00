use super::sink::{LogSink, SqlEvent, TracingSink};
use super::types::{QueryContext, QueryMonitor, QueryResult};
use crate::aggregate::{QueryBatch, QueryRecord, QuerySummary};
use crate::config::LogConfig;
use crate::format::{KeywordFormatter, SqlFormatter};
use crate::truncate::truncate_sql;
use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Ignores every event. The default monitor of an [`InstrumentedClient`](super::InstrumentedClient).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl QueryMonitor for NoopMonitor {
    fn on_query_complete(&self, _ctx: &QueryContext, _duration: Duration, _result: &QueryResult) {}
}

/// Logs each statement as it completes.
///
/// Per statement: filter patterns are checked against the display SQL, then
/// the minimum duration, then the SQL is truncated (if enabled) and
/// formatted before it reaches the sink.
pub struct SqlLogMonitor {
    config: Arc<LogConfig>,
    formatter: Arc<dyn SqlFormatter>,
    sink: Arc<dyn LogSink>,
}

impl SqlLogMonitor {
    /// Create a logger writing to a [`TracingSink`] through a [`KeywordFormatter`].
    pub fn new(config: impl Into<Arc<LogConfig>>) -> Self {
        Self {
            config: config.into(),
            formatter: Arc::new(KeywordFormatter::new()),
            sink: Arc::new(TracingSink::new()),
        }
    }

    /// Replace the formatter.
    pub fn with_formatter<F: SqlFormatter + 'static>(self, formatter: F) -> Self {
        self.with_formatter_arc(Arc::new(formatter))
    }

    pub fn with_formatter_arc(mut self, formatter: Arc<dyn SqlFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Replace the sink.
    pub fn with_sink<S: LogSink + 'static>(self, sink: S) -> Self {
        self.with_sink_arc(Arc::new(sink))
    }

    pub fn with_sink_arc(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// The text that would be logged for `ctx`, or `None` if it is filtered out.
    ///
    /// Batches are not truncated.
    pub fn render(&self, ctx: &QueryContext) -> Option<String> {
        if self.config.is_filtered(&ctx.display_sql) {
            return None;
        }
        let sql = if self.config.truncate && ctx.executions.is_none() {
            truncate_sql(&ctx.display_sql, self.config.truncate_collapse_aggregates)
        } else {
            Cow::Borrowed(ctx.display_sql.as_str())
        };
        Some(if self.formatter.is_passthrough() {
            sql.into_owned()
        } else {
            self.formatter.format(&sql)
        })
    }
}

impl QueryMonitor for SqlLogMonitor {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        if let Some(min) = self.config.min_duration {
            if duration <= min {
                return;
            }
        }
        if let Some(message) = self.render(ctx) {
            self.sink.sql(&SqlEvent {
                message: &message,
                ctx,
                duration,
                result,
            });
        }
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        if let Some(message) = self.render(ctx) {
            self.sink.slow(&message, ctx, duration);
        }
    }
}

/// Records every completed statement into a request-scoped [`QueryBatch`].
///
/// Recording ignores the log filters: a filtered statement still counts
/// toward the summary.
#[derive(Debug, Default)]
pub struct QueryRecorder {
    batch: Mutex<QueryBatch>,
}

impl QueryRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn batch(&self) -> MutexGuard<'_, QueryBatch> {
        self.batch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record directly.
    pub fn record(&self, record: QueryRecord) {
        self.batch().record(record);
    }

    /// Number of statements recorded so far.
    pub fn len(&self) -> usize {
        self.batch().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch().is_empty()
    }

    /// A copy of the records so far.
    pub fn records(&self) -> Vec<QueryRecord> {
        self.batch().records().to_vec()
    }

    /// Summarize the records so far. `None` when nothing was recorded.
    pub fn summary(&self) -> Option<QuerySummary> {
        self.batch().summarize()
    }

    /// Take the batch, leaving the recorder empty.
    pub fn take(&self) -> QueryBatch {
        std::mem::take(&mut *self.batch())
    }
}

impl QueryMonitor for QueryRecorder {
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, _result: &QueryResult) {
        self.record(QueryRecord::new(ctx.recorded_sql(), duration));
    }
}

/// Fans each event out to several monitors, in the order they were added.
pub struct CompositeMonitor {
    monitors: Vec<Arc<dyn QueryMonitor>>,
}

impl CompositeMonitor {
    pub fn new() -> Self {
        Self {
            monitors: Vec::new(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitors.push(Arc::new(monitor));
        self
    }

    /// Add a monitor that is also held elsewhere, such as a [`QueryRecorder`]
    /// read at the end of a request.
    pub fn add_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitors.push(monitor);
        self
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl Default for CompositeMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryMonitor for CompositeMonitor {
    fn on_query_start(&self, ctx: &QueryContext) {
        for monitor in &self.monitors {
            monitor.on_query_start(ctx);
        }
    }

    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        for monitor in &self.monitors {
            monitor.on_query_complete(ctx, duration, result);
        }
    }

    fn on_slow_query(&self, ctx: &QueryContext, duration: Duration) {
        for monitor in &self.monitors {
            monitor.on_slow_query(ctx, duration);
        }
    }
}
