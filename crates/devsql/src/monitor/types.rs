use crate::params::interpolate;
use std::fmt;
use std::time::Duration;
use tokio_postgres::types::ToSql;

/// Statement kind, taken from the leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    /// DDL, `SET`, `SHOW` and anything else.
    Other,
}

const LEADING_KEYWORDS: &[(&str, QueryType)] = &[
    ("SELECT", QueryType::Select),
    ("WITH", QueryType::Select),
    ("INSERT", QueryType::Insert),
    ("UPDATE", QueryType::Update),
    ("DELETE", QueryType::Delete),
];

impl QueryType {
    /// Classify `sql` by its first keyword, skipping whitespace, comments and
    /// opening parentheses. A CTE (`WITH ...`) counts as a select.
    pub fn from_sql(sql: &str) -> Self {
        let head = strip_sql_prefix(sql);
        LEADING_KEYWORDS
            .iter()
            .find(|(keyword, _)| starts_with_keyword(head, keyword))
            .map_or(QueryType::Other, |&(_, kind)| kind)
    }
}

fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if s.starts_with("--") {
            match s.find('\n') {
                Some(pos) => s = &s[pos + 1..],
                None => return "",
            }
        } else if s.starts_with("/*") {
            match s.find("*/") {
                Some(pos) => s = &s[pos + 2..],
                None => return "",
            }
        } else if let Some(rest) = s.strip_prefix('(') {
            s = rest;
        }
        if s == before {
            return s;
        }
    }
}

fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) => prefix.eq_ignore_ascii_case(keyword),
        None => false,
    }
}

/// Context information about the statement being executed.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// SQL as passed to the client, placeholders intact.
    pub sql: String,
    /// SQL with parameters substituted, used for logging and duplicate detection.
    pub display_sql: String,
    /// Number of parameters.
    pub param_count: usize,
    /// Set when one statement ran once per parameter set.
    pub executions: Option<usize>,
    /// Detected query type.
    pub query_type: QueryType,
    /// Optional query name/tag for identification.
    pub tag: Option<String>,
}

impl QueryContext {
    /// Create a context with no parameter substitution.
    pub fn new(sql: &str, param_count: usize) -> Self {
        Self {
            sql: sql.to_string(),
            display_sql: sql.to_string(),
            param_count,
            executions: None,
            query_type: QueryType::from_sql(sql),
            tag: None,
        }
    }

    /// Create a context whose display SQL has `params` substituted.
    pub fn with_params(sql: &str, params: &[&(dyn ToSql + Sync)]) -> Self {
        Self {
            display_sql: interpolate(sql, params),
            ..Self::new(sql, params.len())
        }
    }

    /// Context for a statement run once per parameter set.
    ///
    /// The display SQL keeps its placeholders.
    pub fn batch(sql: &str, executions: usize) -> Self {
        Self {
            executions: Some(executions),
            ..Self::new(sql, 0)
        }
    }

    /// Add a tag to identify this query.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// The text recorded for duplicate detection.
    ///
    /// Batches are recorded as `"<n> times: <sql>"`.
    pub fn recorded_sql(&self) -> String {
        match self.executions {
            Some(n) => format!("{n} times: {}", self.display_sql),
            None => self.display_sql.clone(),
        }
    }
}

/// Error messages longer than this are cut before they reach a monitor.
const MAX_ERROR_LEN: usize = 512;

/// Outcome of a statement as seen by monitors.
#[derive(Debug, Clone)]
pub enum QueryResult {
    /// Rows fetched by `query`.
    Rows(usize),
    /// Rows affected by `execute` or a batch.
    Affected(u64),
    /// Whether `query_one` / `query_opt` found a row.
    OptionalRow(bool),
    /// The statement failed; the message is at most 512 bytes plus `...`.
    Error(String),
}

impl QueryResult {
    /// Build an [`QueryResult::Error`], cutting `msg` on a char boundary.
    pub fn error(msg: String) -> Self {
        if msg.len() <= MAX_ERROR_LEN {
            return Self::Error(msg);
        }
        let mut end = MAX_ERROR_LEN;
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        Self::Error(format!("{}...", &msg[..end]))
    }

    /// Rows returned or affected, when the statement succeeded.
    pub fn row_count(&self) -> Option<u64> {
        match *self {
            Self::Rows(n) => Some(n as u64),
            Self::Affected(n) => Some(n),
            Self::OptionalRow(found) => Some(u64::from(found)),
            Self::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.row_count()) {
            (Self::Error(e), _) => write!(f, "failed: {e}"),
            (Self::Affected(_), Some(n)) => write!(f, "{n} affected"),
            (_, Some(1)) => f.write_str("1 row"),
            (_, Some(n)) => write!(f, "{n} rows"),
            (_, None) => Ok(()),
        }
    }
}

/// Receives statement events from an [`InstrumentedClient`](super::InstrumentedClient).
///
/// Only `on_query_complete` is required. Failed statements are reported too,
/// with a [`QueryResult::Error`].
pub trait QueryMonitor: Send + Sync {
    /// The statement is about to run.
    fn on_query_start(&self, _ctx: &QueryContext) {}

    /// The statement finished, successfully or not, after `duration`.
    fn on_query_complete(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult);

    /// The statement took longer than the configured slow query threshold.
    /// Called after `on_query_complete`.
    fn on_slow_query(&self, _ctx: &QueryContext, _duration: Duration) {}
}
