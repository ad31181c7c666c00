//! Per-request wiring of the SQL logger and the query recorder.

use crate::aggregate::{QueryRecord, QuerySummary};
use crate::client::GenericClient;
use crate::config::LogConfig;
use crate::format::SqlFormatter;
use crate::monitor::{
    CompositeMonitor, InstrumentedClient, LogSink, QueryMonitor, QueryRecorder, SqlLogMonitor,
    TracingSink,
};
use std::sync::{Arc, OnceLock};

/// Everything one logical request needs to log its SQL and summarize it.
///
/// Create one per request, wrap each database client with
/// [`RequestScope::instrument`], and call [`RequestScope::finish`] when the
/// request completes. Clients sharing a scope share its summary.
pub struct RequestScope {
    config: Arc<LogConfig>,
    request_id: Option<String>,
    recorder: Arc<QueryRecorder>,
    formatter: Option<Arc<dyn SqlFormatter>>,
    sink: Arc<dyn LogSink>,
    monitor: OnceLock<Arc<dyn QueryMonitor>>,
}

impl RequestScope {
    /// Start a scope with an empty recorder and a [`TracingSink`].
    ///
    /// Clients wrapped by the scope always report to it, whatever
    /// `monitoring_enabled` says in `config`.
    pub fn new(config: impl Into<Arc<LogConfig>>) -> Self {
        let mut config = config.into();
        if !config.monitoring_enabled {
            Arc::make_mut(&mut config).monitoring_enabled = true;
        }
        Self {
            config,
            request_id: None,
            recorder: Arc::new(QueryRecorder::new()),
            formatter: None,
            sink: Arc::new(TracingSink::new()),
            monitor: OnceLock::new(),
        }
    }

    /// Attach an id reported with the summary.
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Route log output to `sink`.
    pub fn with_sink<S: LogSink + 'static>(self, sink: S) -> Self {
        self.with_sink_arc(Arc::new(sink))
    }

    pub fn with_sink_arc(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self.monitor = OnceLock::new();
        self
    }

    /// Format logged SQL with `formatter` instead of the default.
    pub fn with_formatter<F: SqlFormatter + 'static>(mut self, formatter: F) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self.monitor = OnceLock::new();
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The recorder collecting this request's statements.
    pub fn recorder(&self) -> &Arc<QueryRecorder> {
        &self.recorder
    }

    /// Record a statement that did not go through an instrumented client.
    pub fn record(&self, record: QueryRecord) {
        self.recorder.record(record);
    }

    /// The monitor for this request: the SQL logger, then the recorder.
    ///
    /// Built once and shared by every client the scope instruments.
    pub fn monitor(&self) -> Arc<dyn QueryMonitor> {
        self.monitor
            .get_or_init(|| {
                let mut logger =
                    SqlLogMonitor::new(self.config.clone()).with_sink_arc(self.sink.clone());
                if let Some(formatter) = &self.formatter {
                    logger = logger.with_formatter_arc(formatter.clone());
                }
                let monitor: Arc<dyn QueryMonitor> = Arc::new(
                    CompositeMonitor::new()
                        .add(logger)
                        .add_arc(self.recorder.clone()),
                );
                monitor
            })
            .clone()
    }

    /// Wrap `client` so its statements are logged and recorded in this scope.
    pub fn instrument<C: GenericClient>(&self, client: C) -> InstrumentedClient<C> {
        InstrumentedClient::new(client)
            .with_config(self.config.clone())
            .with_monitor_arc(self.monitor())
    }

    /// End the request.
    ///
    /// Returns `None` if no statement ran. Otherwise the summary is sent to
    /// the sink (when summaries are enabled) and returned.
    pub fn finish(self) -> Option<QuerySummary> {
        let summary = self.recorder.take().summarize()?;
        if self.config.summary_enabled {
            self.sink.summary(&summary, self.request_id.as_deref());
        }
        Some(summary)
    }
}
