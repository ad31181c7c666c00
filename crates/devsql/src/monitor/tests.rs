use super::*;
use crate::aggregate::QuerySummary;
use crate::client::GenericClient;
use crate::config::LogConfig;
use crate::error::{DevSqlError, DevSqlResult};
use crate::format::PassthroughFormatter;
use crate::request::RequestScope;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

// ── Shared test doubles ──

struct DummyClient;
impl GenericClient for DummyClient {
    async fn query(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Vec<Row>> {
        Ok(vec![])
    }
    async fn query_one(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Row> {
        Err(DevSqlError::not_found("no rows"))
    }
    async fn query_opt(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Option<Row>> {
        Ok(None)
    }
    async fn execute(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<u64> {
        Ok(1)
    }
}

struct FailingClient;
impl GenericClient for FailingClient {
    async fn query(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Vec<Row>> {
        Err(DevSqlError::Other("relation \"missing\" does not exist".to_string()))
    }
    async fn query_one(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Row> {
        Err(DevSqlError::Other("boom".to_string()))
    }
    async fn query_opt(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Option<Row>> {
        Err(DevSqlError::Other("boom".to_string()))
    }
    async fn execute(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<u64> {
        Err(DevSqlError::Other("boom".to_string()))
    }
}

#[derive(Default)]
struct MemorySink {
    lines: Mutex<Vec<String>>,
    batches: Mutex<Vec<usize>>,
    slow: Mutex<Vec<String>>,
    summaries: Mutex<Vec<(QuerySummary, Option<String>)>>,
}

impl MemorySink {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogSink for MemorySink {
    fn sql(&self, event: &SqlEvent<'_>) {
        self.lines.lock().unwrap().push(event.message.to_string());
        if let Some(n) = event.ctx.executions {
            self.batches.lock().unwrap().push(n);
        }
    }

    fn slow(&self, message: &str, _ctx: &QueryContext, _duration: Duration) {
        self.slow.lock().unwrap().push(message.to_string());
    }

    fn summary(&self, summary: &QuerySummary, request_id: Option<&str>) {
        self.summaries
            .lock()
            .unwrap()
            .push((summary.clone(), request_id.map(str::to_string)));
    }
}

fn logger(config: LogConfig, sink: &Arc<MemorySink>) -> SqlLogMonitor {
    SqlLogMonitor::new(config)
        .with_formatter(PassthroughFormatter)
        .with_sink_arc(sink.clone())
}

fn enabled() -> LogConfig {
    LogConfig::new().enable_monitoring()
}

// ── QueryType / QueryContext ──

#[test]
fn test_query_type_detection() {
    assert_eq!(QueryType::from_sql("SELECT * FROM users"), QueryType::Select);
    assert_eq!(QueryType::from_sql("  select * FROM users"), QueryType::Select);
    assert_eq!(
        QueryType::from_sql("/* c */ -- line\n(SELECT 1)"),
        QueryType::Select
    );
    assert_eq!(
        QueryType::from_sql("WITH cte AS (SELECT 1) SELECT * FROM cte"),
        QueryType::Select
    );
    assert_eq!(
        QueryType::from_sql("INSERT INTO users (name) VALUES ($1)"),
        QueryType::Insert
    );
    assert_eq!(QueryType::from_sql("UPDATE users SET name = $1"), QueryType::Update);
    assert_eq!(
        QueryType::from_sql("DELETE FROM users WHERE id = $1"),
        QueryType::Delete
    );
    assert_eq!(QueryType::from_sql("CREATE TABLE users (id INT)"), QueryType::Other);
}

#[test]
fn context_substitutes_params_for_display_only() {
    let ctx = QueryContext::with_params("SELECT * FROM t WHERE id = $1", &[&7_i64]);
    assert_eq!(ctx.sql, "SELECT * FROM t WHERE id = $1");
    assert_eq!(ctx.display_sql, "SELECT * FROM t WHERE id = 7");
    assert_eq!(ctx.param_count, 1);
    assert_eq!(ctx.recorded_sql(), "SELECT * FROM t WHERE id = 7");
}

#[test]
fn batch_context_records_execution_count() {
    let ctx = QueryContext::batch("INSERT INTO t (a) VALUES ($1)", 3);
    assert_eq!(ctx.recorded_sql(), "3 times: INSERT INTO t (a) VALUES ($1)");
}

#[test]
fn query_result_error_is_truncated_on_char_boundary() {
    let msg = "é".repeat(400);
    match QueryResult::error(msg) {
        QueryResult::Error(e) => {
            assert!(e.ends_with("..."));
            assert!(e.len() <= 512 + 3);
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(QueryResult::Rows(3).row_count(), Some(3));
    assert_eq!(QueryResult::OptionalRow(false).row_count(), Some(0));
    assert_eq!(QueryResult::error("x".into()).row_count(), None);
}

// ── SqlLogMonitor ──

#[test]
fn logger_truncates_before_logging() {
    let sink = Arc::new(MemorySink::default());
    let monitor = logger(enabled(), &sink);
    let ctx = QueryContext::new("SELECT id, name, email FROM users WHERE id IN (1,2,3,4,5)", 0);

    monitor.on_query_complete(&ctx, Duration::from_millis(2), &QueryResult::Rows(5));

    assert_eq!(
        sink.lines(),
        vec!["SELECT ... FROM users WHERE id IN (1, 2, 3, ...)".to_string()]
    );
}

#[test]
fn logger_keeps_sql_when_truncation_disabled() {
    let sink = Arc::new(MemorySink::default());
    let monitor = logger(enabled().with_truncate(false), &sink);
    let sql = "SELECT id, name FROM users WHERE id IN (1,2,3,4,5)";

    monitor.on_query_complete(&QueryContext::new(sql, 0), Duration::ZERO, &QueryResult::Rows(0));

    assert_eq!(sink.lines(), vec![sql.to_string()]);
}

#[test]
fn logger_formats_with_keyword_formatter_by_default() {
    let sink = Arc::new(MemorySink::default());
    let monitor = SqlLogMonitor::new(enabled()).with_sink_arc(sink.clone());
    let ctx = QueryContext::new("SELECT COUNT(*) FROM users where active", 0);

    monitor.on_query_complete(&ctx, Duration::ZERO, &QueryResult::Rows(1));

    assert_eq!(
        sink.lines(),
        vec!["SELECT COUNT(*)\nFROM users\nWHERE active".to_string()]
    );
}

#[test]
fn logger_skips_filtered_statements() {
    let sink = Arc::new(MemorySink::default());
    let config = enabled().with_filter_pattern("pg_catalog").unwrap();
    let monitor = logger(config, &sink);

    monitor.on_query_complete(
        &QueryContext::new("SELECT typname FROM pg_catalog.pg_type", 0),
        Duration::ZERO,
        &QueryResult::Rows(0),
    );
    monitor.on_slow_query(
        &QueryContext::new("SELECT typname FROM pg_catalog.pg_type", 0),
        Duration::from_secs(1),
    );
    monitor.on_query_complete(&QueryContext::new("SELECT 1", 0), Duration::ZERO, &QueryResult::Rows(1));

    assert_eq!(sink.lines(), vec!["SELECT 1".to_string()]);
    assert!(sink.slow.lock().unwrap().is_empty());
}

#[test]
fn filter_sees_substituted_params() {
    let sink = Arc::new(MemorySink::default());
    let monitor = logger(enabled().with_filter_pattern("secret").unwrap(), &sink);
    let ctx = QueryContext::with_params("SELECT * FROM t WHERE k = $1", &[&"secret"]);

    monitor.on_query_complete(&ctx, Duration::ZERO, &QueryResult::Rows(0));

    assert!(sink.lines().is_empty());
}

#[test]
fn logger_respects_min_duration() {
    let sink = Arc::new(MemorySink::default());
    let monitor = logger(enabled().with_min_duration(Duration::from_millis(5)), &sink);
    let ctx = QueryContext::new("SELECT 1", 0);

    monitor.on_query_complete(&ctx, Duration::from_millis(1), &QueryResult::Rows(1));
    monitor.on_query_complete(&ctx, Duration::from_millis(5), &QueryResult::Rows(1));
    monitor.on_query_complete(&ctx, Duration::from_millis(6), &QueryResult::Rows(1));

    assert_eq!(sink.lines().len(), 1);
}

#[test]
fn logger_does_not_truncate_batches() {
    let sink = Arc::new(MemorySink::default());
    let monitor = logger(enabled(), &sink);
    let ctx = QueryContext::batch("SELECT a, b FROM t WHERE id = $1", 2);

    monitor.on_query_complete(&ctx, Duration::ZERO, &QueryResult::Affected(2));

    assert_eq!(sink.lines(), vec!["SELECT a, b FROM t WHERE id = $1".to_string()]);
    assert_eq!(*sink.batches.lock().unwrap(), vec![2]);
}

// ── QueryRecorder / CompositeMonitor ──

#[test]
fn recorder_collects_in_order_and_summarizes() {
    let recorder = QueryRecorder::new();
    assert!(recorder.summary().is_none());

    for (sql, ms) in [("X", 5), ("X", 3), ("Y", 2)] {
        recorder.on_query_complete(
            &QueryContext::new(sql, 0),
            Duration::from_millis(ms),
            &QueryResult::Rows(0),
        );
    }

    let records = recorder.records();
    assert_eq!(records.iter().map(|r| r.sql.as_str()).collect::<Vec<_>>(), ["X", "X", "Y"]);

    let summary = recorder.summary().unwrap();
    assert_eq!(summary.total_count, 3);
    assert_eq!(summary.unique_count, 2);
    assert_eq!(summary.duplicate_count, 1);
    assert_eq!(summary.total_duration_ms, 10.0);

    let batch = recorder.take();
    assert_eq!(batch.len(), 3);
    assert!(recorder.is_empty());
}

#[test]
fn composite_monitor_delegates_to_all() {
    let first = Arc::new(QueryRecorder::new());
    let second = Arc::new(QueryRecorder::new());
    let composite = CompositeMonitor::new()
        .add_arc(first.clone())
        .add_arc(second.clone());
    assert_eq!(composite.len(), 2);

    composite.on_query_complete(&QueryContext::new("SELECT 1", 0), Duration::ZERO, &QueryResult::Rows(1));

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
}

// ── InstrumentedClient ──

#[tokio::test]
async fn instrumented_client_reports_every_statement() {
    let recorder = Arc::new(QueryRecorder::new());
    let client = InstrumentedClient::new(DummyClient)
        .with_config(enabled())
        .with_monitor_arc(recorder.clone());

    client.query("SELECT * FROM t WHERE id = $1", &[&1_i32]).await.unwrap();
    client.query_opt("SELECT 1", &[]).await.unwrap();
    client.execute("DELETE FROM t", &[]).await.unwrap();
    assert!(client.query_one("SELECT 1", &[]).await.unwrap_err().is_not_found());

    let sqls: Vec<String> = recorder.records().into_iter().map(|r| r.sql).collect();
    assert_eq!(
        sqls,
        ["SELECT * FROM t WHERE id = 1", "SELECT 1", "DELETE FROM t", "SELECT 1"]
    );
}

#[tokio::test]
async fn monitoring_disabled_reports_nothing() {
    let recorder = Arc::new(QueryRecorder::new());
    let client = InstrumentedClient::new(DummyClient).with_monitor_arc(recorder.clone());
    assert!(!client.is_monitoring_enabled());

    client.query("SELECT 1", &[]).await.unwrap();
    let params: &[&(dyn ToSql + Sync)] = &[&1_i32];
    client.execute_many("INSERT INTO t VALUES ($1)", &[params]).await.unwrap();

    assert!(recorder.is_empty());
}

#[tokio::test]
async fn errors_propagate_unchanged_and_are_still_reported() {
    #[derive(Default)]
    struct ResultCapture(Mutex<Vec<String>>);

    impl QueryMonitor for ResultCapture {
        fn on_query_complete(&self, _: &QueryContext, _: Duration, result: &QueryResult) {
            self.0.lock().unwrap().push(result.to_string());
        }
    }

    let capture = Arc::new(ResultCapture::default());
    let client = InstrumentedClient::new(FailingClient)
        .with_config(enabled())
        .with_monitor_arc(capture.clone());

    let err = client.query("SELECT * FROM missing", &[]).await.unwrap_err();
    match err {
        DevSqlError::Other(msg) => assert_eq!(msg, "relation \"missing\" does not exist"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(client.execute("DELETE FROM t", &[]).await.is_err());

    assert_eq!(
        *capture.0.lock().unwrap(),
        vec![
            "failed: relation \"missing\" does not exist".to_string(),
            "failed: boom".to_string(),
        ]
    );
}

#[tokio::test]
async fn tagged_queries_propagate_to_monitor() {
    #[derive(Default)]
    struct TagCapture(Mutex<Option<String>>);

    impl QueryMonitor for TagCapture {
        fn on_query_complete(&self, ctx: &QueryContext, _: Duration, _: &QueryResult) {
            *self.0.lock().unwrap() = ctx.tag.clone();
        }
    }

    let capture = Arc::new(TagCapture::default());
    let client = InstrumentedClient::new(DummyClient)
        .with_config(enabled())
        .with_monitor_arc(capture.clone());

    client.query_tagged("users.list", "SELECT 1", &[]).await.unwrap();

    assert_eq!(capture.0.lock().unwrap().as_deref(), Some("users.list"));
}

#[tokio::test]
async fn slow_queries_reach_the_sink() {
    struct SleepyClient;
    impl GenericClient for SleepyClient {
        async fn query(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Vec<Row>> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(vec![])
        }
        async fn query_one(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Row> {
            Err(DevSqlError::not_found("unused"))
        }
        async fn query_opt(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Option<Row>> {
            Ok(None)
        }
        async fn execute(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> DevSqlResult<u64> {
            Ok(0)
        }
    }

    let sink = Arc::new(MemorySink::default());
    let config = enabled().with_slow_query_threshold(Duration::from_millis(1));
    let client = InstrumentedClient::new(SleepyClient)
        .with_config(config.clone())
        .with_monitor(logger(config, &sink));

    client.query("SELECT pg_sleep(0.005)", &[]).await.unwrap();
    client.execute("SELECT 1", &[]).await.unwrap();

    assert_eq!(sink.lines().len(), 2);
    assert_eq!(*sink.slow.lock().unwrap(), vec!["SELECT pg_sleep(0.005)".to_string()]);
}

#[tokio::test]
async fn execute_many_reports_one_batch_event() {
    let recorder = Arc::new(QueryRecorder::new());
    let client = InstrumentedClient::new(DummyClient)
        .with_config(enabled())
        .with_monitor_arc(recorder.clone());

    let a: &[&(dyn ToSql + Sync)] = &[&1_i32];
    let b: &[&(dyn ToSql + Sync)] = &[&2_i32];
    let c: &[&(dyn ToSql + Sync)] = &[&3_i32];
    let affected = client
        .execute_many("INSERT INTO t (a) VALUES ($1)", &[a, b, c])
        .await
        .unwrap();

    assert_eq!(affected, 3);
    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sql, "3 times: INSERT INTO t (a) VALUES ($1)");
}

#[tokio::test]
async fn execute_many_stops_at_first_error() {
    let recorder = Arc::new(QueryRecorder::new());
    let client = InstrumentedClient::new(FailingClient)
        .with_config(enabled())
        .with_monitor_arc(recorder.clone());

    let first: &[&(dyn ToSql + Sync)] = &[&1_i32];
    let second: &[&(dyn ToSql + Sync)] = &[&2_i32];
    let err = client
        .execute_many("INSERT INTO t (a) VALUES ($1)", &[first, second])
        .await
        .unwrap_err();

    assert!(matches!(err, DevSqlError::Other(ref m) if m == "boom"));
    assert_eq!(recorder.len(), 1);
}

// ── RequestScope ──

#[tokio::test]
async fn filtered_statements_still_count_toward_summary() {
    let sink = Arc::new(MemorySink::default());
    let config = enabled().with_filter_pattern("pg_catalog").unwrap();
    let scope = RequestScope::new(config)
        .with_formatter(PassthroughFormatter)
        .with_sink_arc(sink.clone());
    let db = scope.instrument(DummyClient);

    db.query("SELECT typname FROM pg_catalog.pg_type", &[]).await.unwrap();
    db.query("SELECT typname FROM pg_catalog.pg_type", &[]).await.unwrap();
    db.execute("UPDATE users SET seen = true", &[]).await.unwrap();

    assert!(sink.lines().iter().all(|l| !l.contains("pg_catalog")));
    assert_eq!(sink.lines().len(), 1);

    let summary = scope.finish().unwrap();
    assert_eq!(summary.total_count, 3);
    assert_eq!(summary.duplicate_count, 1);
}

#[tokio::test]
async fn scope_summary_spans_all_clients() {
    let sink = Arc::new(MemorySink::default());
    let scope = RequestScope::new(enabled())
        .with_request_id("GET /users")
        .with_sink_arc(sink.clone());
    let primary = scope.instrument(DummyClient);
    let replica = scope.instrument(DummyClient);

    primary.query("SELECT * FROM users WHERE id = $1", &[&1_i32]).await.unwrap();
    replica.query("SELECT * FROM users WHERE id = $1", &[&1_i32]).await.unwrap();
    replica.query("SELECT * FROM users WHERE id = $1", &[&2_i32]).await.unwrap();

    let summary = scope.finish().unwrap();
    assert_eq!(summary.total_count, 3);
    assert_eq!(summary.unique_count, 2);
    assert_eq!(summary.duplicate_count, 1);

    let summaries = sink.summaries.lock().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].0, summary);
    assert_eq!(summaries[0].1.as_deref(), Some("GET /users"));
}

#[tokio::test]
async fn default_config_scope_still_summarizes() {
    let sink = Arc::new(MemorySink::default());
    let scope = RequestScope::new(LogConfig::new()).with_sink_arc(sink.clone());
    assert!(scope.config().monitoring_enabled);
    let db = scope.instrument(DummyClient);
    assert!(db.is_monitoring_enabled());

    db.query("SELECT 1", &[]).await.unwrap();
    db.query("SELECT 1", &[]).await.unwrap();

    let summary = scope.finish().unwrap();
    assert_eq!(
        (summary.total_count, summary.unique_count, summary.duplicate_count),
        (2, 1, 1)
    );
    assert_eq!(sink.lines().len(), 2);
    assert_eq!(sink.summaries.lock().unwrap().len(), 1);
}

#[test]
fn empty_scope_emits_nothing() {
    let sink = Arc::new(MemorySink::default());
    let scope = RequestScope::new(enabled()).with_sink_arc(sink.clone());

    assert!(scope.finish().is_none());
    assert!(sink.summaries.lock().unwrap().is_empty());
}

#[test]
fn disabled_summary_is_returned_but_not_emitted() {
    let sink = Arc::new(MemorySink::default());
    let scope = RequestScope::new(enabled().with_summary(false)).with_sink_arc(sink.clone());
    scope.record(crate::aggregate::QueryRecord::from_millis("SELECT 1", 1.0));

    assert_eq!(scope.finish().map(|s| s.total_count), Some(1));
    assert!(sink.summaries.lock().unwrap().is_empty());
}

#[test]
fn tracing_sink_without_subscriber_is_silent() {
    let sink = TracingSink::new();
    let ctx = QueryContext::batch("INSERT INTO t VALUES ($1)", 2);
    sink.sql(&SqlEvent {
        message: "INSERT INTO t VALUES ($1)",
        ctx: &ctx,
        duration: Duration::from_millis(1),
        result: &QueryResult::Affected(2),
    });
    sink.summary(
        &crate::aggregate::summarize(&[crate::aggregate::QueryRecord::from_millis("X", 1.0)])
            .unwrap(),
        None,
    );
}
