//! # devsql
//!
//! Development-time SQL logging for PostgreSQL clients.
//!
//! ## Features
//!
//! - **Live SQL log**: every statement with its duration and row count, via `tracing`
//! - **Readable output**: long numeric `IN` lists and `SELECT` field lists are shortened,
//!   keywords are uppercased and clauses put on their own lines
//! - **Filters**: regex patterns hide noisy statements; a minimum duration hides fast ones
//! - **Request summaries**: `N queries with M duplicates` plus total time, once per request
//!
//! ## Usage
//!
//! ```ignore
//! use devsql::{GenericClient, LogConfig, RequestScope};
//!
//! let config = LogConfig::new()
//!     .with_filter_pattern("pg_catalog")?
//!     .with_min_duration_ms(1.0)
//!     .enable_monitoring();
//!
//! let scope = RequestScope::new(config).with_request_id("GET /users");
//! let db = scope.instrument(&client);
//!
//! db.query("SELECT id, name FROM users WHERE id = ANY($1)", &[&ids]).await?;
//!
//! // Logs "1 queries with 0 duplicates" at INFO.
//! scope.finish();
//! ```

pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod monitor;
pub mod params;
pub mod request;
pub mod truncate;

#[cfg(feature = "subscriber")]
pub mod logging;

pub use aggregate::{QueryBatch, QueryRecord, QuerySummary, summarize};
pub use client::GenericClient;
pub use config::LogConfig;
pub use error::{DevSqlError, DevSqlResult};
pub use format::{KeywordFormatter, PassthroughFormatter, SqlFormatter};
pub use monitor::{
    CompositeMonitor, InstrumentedClient, LogSink, NoopMonitor, QueryContext, QueryMonitor,
    QueryRecorder, QueryResult, QueryType, SqlEvent, SqlLogMonitor, TracingSink,
};
pub use request::RequestScope;
pub use truncate::{truncate_in_lists, truncate_select_fields, truncate_sql};
