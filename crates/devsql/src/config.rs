use crate::error::{DevSqlError, DevSqlResult};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration for SQL logging and per-request summaries.
///
/// By default, monitoring is disabled and must be explicitly enabled.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether monitoring is enabled.
    pub monitoring_enabled: bool,
    /// Statements matching any of these are not logged (they are still recorded).
    pub filter_patterns: Vec<Regex>,
    /// Shorten SQL before logging (see [`crate::truncate`]).
    pub truncate: bool,
    /// Collapse the field list of aggregate queries too.
    pub truncate_collapse_aggregates: bool,
    /// Only log statements slower than this. `None` logs everything.
    pub min_duration: Option<Duration>,
    /// Slow query threshold for warnings.
    pub slow_query_threshold: Option<Duration>,
    /// Emit a summary when a request finishes.
    pub summary_enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            monitoring_enabled: false,
            filter_patterns: Vec::new(),
            truncate: true,
            truncate_collapse_aggregates: false,
            min_duration: None,
            slow_query_threshold: None,
            summary_enabled: true,
        }
    }
}

impl LogConfig {
    /// Create a new configuration with defaults (monitoring disabled).
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress logging of statements matching `pattern`.
    ///
    /// Fails if `pattern` is not a valid regex.
    pub fn with_filter_pattern(mut self, pattern: &str) -> DevSqlResult<Self> {
        let re = Regex::new(pattern).map_err(|e| DevSqlError::invalid_pattern(pattern, e))?;
        self.filter_patterns.push(re);
        Ok(self)
    }

    /// Suppress logging of statements matching `re`.
    pub fn with_filter_regex(mut self, re: Regex) -> Self {
        self.filter_patterns.push(re);
        self
    }

    /// Enable or disable truncation.
    pub fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// Collapse aggregate field lists as well when truncating.
    pub fn with_collapse_aggregates(mut self, collapse: bool) -> Self {
        self.truncate_collapse_aggregates = collapse;
        self
    }

    /// Only log statements slower than `duration`. Zero disables the filter.
    pub fn with_min_duration(mut self, duration: Duration) -> Self {
        self.min_duration = (!duration.is_zero()).then_some(duration);
        self
    }

    /// Like [`LogConfig::with_min_duration`], in milliseconds.
    ///
    /// Zero, negative and NaN values disable the filter.
    pub fn with_min_duration_ms(self, ms: f64) -> Self {
        self.with_min_duration(duration_from_ms(ms))
    }

    /// Set the slow query threshold.
    ///
    /// Queries exceeding this duration will trigger `on_slow_query` callbacks.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Enable or disable the end-of-request summary.
    pub fn with_summary(mut self, enabled: bool) -> Self {
        self.summary_enabled = enabled;
        self
    }

    /// Enable monitoring.
    ///
    /// Monitoring must be explicitly enabled for monitors to receive events.
    pub fn enable_monitoring(mut self) -> Self {
        self.monitoring_enabled = true;
        self
    }

    /// Disable monitoring.
    pub fn disable_monitoring(mut self) -> Self {
        self.monitoring_enabled = false;
        self
    }

    /// Whether `sql` matches one of the filter patterns.
    pub fn is_filtered(&self, sql: &str) -> bool {
        self.filter_patterns.iter().any(|re| re.is_match(sql))
    }

    /// Parse a TOML document with a `[devsql]` table.
    ///
    /// ```toml
    /// [devsql]
    /// enabled = true
    /// filter_sql = ["pg_catalog", "^SET "]
    /// truncate_sql = true
    /// truncate_aggregates = false
    /// sql_min_duration_ms = 5.0
    /// slow_query_ms = 200
    /// summary = true
    /// ```
    ///
    /// Missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> DevSqlResult<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        file.devsql.into_config()
    }

    /// Read and parse a TOML config file (see [`LogConfig::from_toml_str`]).
    pub fn load(path: impl AsRef<Path>) -> DevSqlResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            DevSqlError::Toml(e) => {
                DevSqlError::config(format!("failed to parse {}: {e}", path.display()))
            }
            other => other,
        })
    }
}

fn duration_from_ms(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_nanos((ms * 1_000_000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    devsql: Section,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Section {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    filter_sql: Vec<String>,
    #[serde(default = "default_true")]
    truncate_sql: bool,
    #[serde(default)]
    truncate_aggregates: bool,
    #[serde(default)]
    sql_min_duration_ms: f64,
    slow_query_ms: Option<f64>,
    #[serde(default = "default_true")]
    summary: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Section {
    fn default() -> Self {
        Self {
            enabled: false,
            filter_sql: Vec::new(),
            truncate_sql: true,
            truncate_aggregates: false,
            sql_min_duration_ms: 0.0,
            slow_query_ms: None,
            summary: true,
        }
    }
}

impl Section {
    fn into_config(self) -> DevSqlResult<LogConfig> {
        let mut config = LogConfig::new()
            .with_truncate(self.truncate_sql)
            .with_collapse_aggregates(self.truncate_aggregates)
            .with_min_duration_ms(self.sql_min_duration_ms)
            .with_summary(self.summary);
        for pattern in &self.filter_sql {
            config = config.with_filter_pattern(pattern)?;
        }
        if let Some(ms) = self.slow_query_ms {
            let threshold = duration_from_ms(ms);
            if threshold.is_zero() {
                return Err(DevSqlError::config(format!(
                    "slow_query_ms must be positive, got {ms}"
                )));
            }
            config = config.with_slow_query_threshold(threshold);
        }
        config.monitoring_enabled = self.enabled;
        Ok(config)
    }
}
