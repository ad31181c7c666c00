//! Query monitoring for SQL execution.
//!
//! This module provides:
//! - [`InstrumentedClient`]: times every statement and reports it to a monitor
//! - [`SqlLogMonitor`]: filters, truncates and formats statements, then logs them
//! - [`QueryRecorder`]: collects statements for the end-of-request summary
//! - [`LogSink`]: where log output goes ([`TracingSink`] by default)
//!
//! Monitors are passed to each client explicitly; nothing is installed
//! globally.
//!
//! # Example
//!
//! ```rust,ignore
//! use devsql::monitor::{CompositeMonitor, InstrumentedClient, QueryRecorder, SqlLogMonitor};
//! use devsql::LogConfig;
//! use std::sync::Arc;
//!
//! let config = Arc::new(LogConfig::new().with_filter_pattern("pg_catalog")?.enable_monitoring());
//! let recorder = Arc::new(QueryRecorder::new());
//! let monitor = CompositeMonitor::new()
//!     .add(SqlLogMonitor::new(config.clone()))
//!     .add_arc(recorder.clone());
//!
//! let client = InstrumentedClient::new(db_client)
//!     .with_config(config)
//!     .with_monitor(monitor);
//!
//! // ... run queries ...
//!
//! if let Some(summary) = recorder.summary() {
//!     println!("{summary}");
//! }
//! ```

mod instrumented;
mod monitors;
mod sink;
mod types;

#[cfg(test)]
mod tests;

pub use instrumented::InstrumentedClient;
pub use monitors::{CompositeMonitor, NoopMonitor, QueryRecorder, SqlLogMonitor};
pub use sink::{LogSink, SqlEvent, TracingSink};
pub use types::{QueryContext, QueryMonitor, QueryResult, QueryType};
