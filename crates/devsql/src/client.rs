//! The client seam every instrumented call goes through.

use crate::error::{DevSqlError, DevSqlResult};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// Anything that can run SQL: a `tokio_postgres` client or transaction, or
/// another wrapper.
///
/// [`crate::monitor::InstrumentedClient`] wraps any implementation and
/// implements the trait itself, so instrumented and plain clients are
/// interchangeable.
pub trait GenericClient: Send + Sync {
    /// Run `sql` and collect every row.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Vec<Row>>> + Send;

    /// [`GenericClient::query`] with a label shown next to the logged SQL.
    ///
    /// Plain clients drop the label.
    fn query_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Vec<Row>>> + Send {
        let _ = tag;
        self.query(sql, params)
    }

    /// Run `sql` and return its first row, or [`DevSqlError::NotFound`].
    fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Row>> + Send;

    /// Tagged variant of [`GenericClient::query_one`].
    fn query_one_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Row>> + Send {
        let _ = tag;
        self.query_one(sql, params)
    }

    /// Run `sql` and return its first row if there is one.
    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Option<Row>>> + Send;

    /// Tagged variant of [`GenericClient::query_opt`].
    fn query_opt_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Option<Row>>> + Send {
        let _ = tag;
        self.query_opt(sql, params)
    }

    /// Run a statement and return how many rows it touched.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<u64>> + Send;

    /// Tagged variant of [`GenericClient::execute`].
    fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<u64>> + Send {
        let _ = tag;
        self.execute(sql, params)
    }
}

// `query_one`/`query_opt` go through `query` so an empty result surfaces as
// `DevSqlError::NotFound` rather than a driver error.
macro_rules! impl_for_postgres {
    ($ty:ty) => {
        impl GenericClient for $ty {
            async fn query(
                &self,
                sql: &str,
                params: &[&(dyn ToSql + Sync)],
            ) -> DevSqlResult<Vec<Row>> {
                Ok(<$ty>::query(self, sql, params).await?)
            }

            async fn query_one(
                &self,
                sql: &str,
                params: &[&(dyn ToSql + Sync)],
            ) -> DevSqlResult<Row> {
                first_row(GenericClient::query(self, sql, params).await?)
                    .ok_or_else(|| DevSqlError::not_found("query returned no rows"))
            }

            async fn query_opt(
                &self,
                sql: &str,
                params: &[&(dyn ToSql + Sync)],
            ) -> DevSqlResult<Option<Row>> {
                Ok(first_row(GenericClient::query(self, sql, params).await?))
            }

            async fn execute(
                &self,
                sql: &str,
                params: &[&(dyn ToSql + Sync)],
            ) -> DevSqlResult<u64> {
                Ok(<$ty>::execute(self, sql, params).await?)
            }
        }
    };
}

fn first_row(rows: Vec<Row>) -> Option<Row> {
    rows.into_iter().next()
}

impl_for_postgres!(tokio_postgres::Client);
impl_for_postgres!(tokio_postgres::Transaction<'_>);

impl<T: GenericClient> GenericClient for &T {
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Vec<Row>>> + Send {
        (**self).query(sql, params)
    }

    fn query_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Vec<Row>>> + Send {
        (**self).query_tagged(tag, sql, params)
    }

    fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Row>> + Send {
        (**self).query_one(sql, params)
    }

    fn query_one_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Row>> + Send {
        (**self).query_one_tagged(tag, sql, params)
    }

    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Option<Row>>> + Send {
        (**self).query_opt(sql, params)
    }

    fn query_opt_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<Option<Row>>> + Send {
        (**self).query_opt_tagged(tag, sql, params)
    }

    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<u64>> + Send {
        (**self).execute(sql, params)
    }

    fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DevSqlResult<u64>> + Send {
        (**self).execute_tagged(tag, sql, params)
    }
}
