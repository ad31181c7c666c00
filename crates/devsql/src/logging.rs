//! Subscriber setup for binaries and examples.

use crate::error::{DevSqlError, DevSqlResult};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a global `fmt` subscriber.
///
/// The filter is read from `RUST_LOG`, falling back to `default_directive`
/// (for example `"devsql=debug"`). Fails if a global subscriber is already
/// set.
pub fn init_subscriber(default_directive: &str) -> DevSqlResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| DevSqlError::SubscriberInit(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| DevSqlError::SubscriberInit(e.to_string()))
}
