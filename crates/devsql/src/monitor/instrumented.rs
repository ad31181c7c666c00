use super::monitors::NoopMonitor;
use super::types::{QueryContext, QueryMonitor, QueryResult};
use crate::client::GenericClient;
use crate::config::LogConfig;
use crate::error::{DevSqlError, DevSqlResult};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// Wraps a [`GenericClient`], timing each statement and reporting it to a
/// [`QueryMonitor`].
///
/// Failed statements are reported too. Whatever the inner client returns,
/// rows or error, is handed back unchanged. Nothing is reported until
/// [`LogConfig::enable_monitoring`] is set.
pub struct InstrumentedClient<C> {
    pub(super) client: C,
    pub(super) monitor: Arc<dyn QueryMonitor>,
    pub(super) config: Arc<LogConfig>,
}

impl<C: GenericClient> InstrumentedClient<C> {
    /// Wrap `client` with a no-op monitor and monitoring off.
    pub fn new(client: C) -> Self {
        Self {
            client,
            monitor: Arc::new(NoopMonitor),
            config: Arc::new(LogConfig::default()),
        }
    }

    /// Use `config` for filters, thresholds and the on/off switch.
    pub fn with_config(mut self, config: impl Into<Arc<LogConfig>>) -> Self {
        self.config = config.into();
        self
    }

    /// Report statements to `monitor`.
    pub fn with_monitor<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    /// Report statements to a shared monitor.
    pub fn with_monitor_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn enable_monitoring(mut self) -> Self {
        Arc::make_mut(&mut self.config).monitoring_enabled = true;
        self
    }

    pub fn disable_monitoring(mut self) -> Self {
        Arc::make_mut(&mut self.config).monitoring_enabled = false;
        self
    }

    pub fn is_monitoring_enabled(&self) -> bool {
        self.config.monitoring_enabled
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.client
    }

    /// Unwrap, dropping the monitor.
    pub fn into_inner(self) -> C {
        self.client
    }

    fn report(
        &self,
        ctx: &QueryContext,
        duration: Duration,
        result: &QueryResult,
    ) {
        self.monitor.on_query_complete(ctx, duration, result);
        let slow = self
            .config
            .slow_query_threshold
            .is_some_and(|threshold| duration > threshold);
        if slow {
            self.monitor.on_slow_query(ctx, duration);
        }
    }

    /// Time `future`, report its outcome, and hand the outcome back untouched.
    pub(super) async fn run<T, F>(
        &self,
        ctx: QueryContext,
        future: F,
        classify: impl FnOnce(&T) -> QueryResult,
    ) -> DevSqlResult<T>
    where
        F: Future<Output = DevSqlResult<T>>,
    {
        self.monitor.on_query_start(&ctx);

        let started = Instant::now();
        let result = future.await;
        let elapsed = started.elapsed();

        let outcome = match &result {
            Ok(value) => classify(value),
            Err(DevSqlError::NotFound(_)) => QueryResult::OptionalRow(false),
            Err(e) => QueryResult::error(e.to_string()),
        };

        self.report(&ctx, elapsed, &outcome);
        result
    }

    fn context(&self, sql: &str, params: &[&(dyn ToSql + Sync)], tag: Option<&str>) -> QueryContext {
        let ctx = QueryContext::with_params(sql, params);
        match tag {
            Some(tag) => ctx.with_tag(tag),
            None => ctx,
        }
    }

    pub(super) async fn query_inner(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        tag: Option<&str>,
    ) -> DevSqlResult<Vec<Row>> {
        if !self.config.monitoring_enabled {
            return self.client.query(sql, params).await;
        }
        let ctx = self.context(sql, params, tag);
        self.run(ctx, self.client.query(sql, params), |rows| {
            QueryResult::Rows(rows.len())
        })
        .await
    }

    pub(super) async fn query_one_inner(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        tag: Option<&str>,
    ) -> DevSqlResult<Row> {
        if !self.config.monitoring_enabled {
            return self.client.query_one(sql, params).await;
        }
        let ctx = self.context(sql, params, tag);
        self.run(ctx, self.client.query_one(sql, params), |_| {
            QueryResult::OptionalRow(true)
        })
        .await
    }

    pub(super) async fn query_opt_inner(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        tag: Option<&str>,
    ) -> DevSqlResult<Option<Row>> {
        if !self.config.monitoring_enabled {
            return self.client.query_opt(sql, params).await;
        }
        let ctx = self.context(sql, params, tag);
        self.run(ctx, self.client.query_opt(sql, params), |row| {
            QueryResult::OptionalRow(row.is_some())
        })
        .await
    }

    pub(super) async fn execute_inner(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        tag: Option<&str>,
    ) -> DevSqlResult<u64> {
        if !self.config.monitoring_enabled {
            return self.client.execute(sql, params).await;
        }
        let ctx = self.context(sql, params, tag);
        self.run(ctx, self.client.execute(sql, params), |n| {
            QueryResult::Affected(*n)
        })
        .await
    }

    /// Execute one statement once per parameter set.
    ///
    /// Stops at the first error. The whole batch is reported as a single
    /// event and returns the total number of affected rows.
    pub async fn execute_many(
        &self,
        sql: &str,
        param_sets: &[&[&(dyn ToSql + Sync)]],
    ) -> DevSqlResult<u64> {
        let batch = async {
            let mut affected = 0u64;
            for params in param_sets {
                affected += self.client.execute(sql, params).await?;
            }
            Ok::<_, DevSqlError>(affected)
        };
        if !self.config.monitoring_enabled {
            return batch.await;
        }
        let ctx = QueryContext::batch(sql, param_sets.len());
        self.run(ctx, batch, |n| QueryResult::Affected(*n)).await
    }
}

impl<C: GenericClient> GenericClient for InstrumentedClient<C> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Vec<Row>> {
        self.query_inner(sql, params, None).await
    }

    async fn query_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> DevSqlResult<Vec<Row>> {
        self.query_inner(sql, params, Some(tag)).await
    }

    async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DevSqlResult<Row> {
        self.query_one_inner(sql, params, None).await
    }

    async fn query_one_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> DevSqlResult<Row> {
        self.query_one_inner(sql, params, Some(tag)).await
    }

    async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> DevSqlResult<Option<Row>> {
        self.query_opt_inner(sql, params, None).await
    }

    async fn query_opt_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> DevSqlResult<Option<Row>> {
        self.query_opt_inner(sql, params, Some(tag)).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DevSqlResult<u64> {
        self.execute_inner(sql, params, None).await
    }

    async fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> DevSqlResult<u64> {
        self.execute_inner(sql, params, Some(tag)).await
    }
}
