//! Installs the crate's `tracing` subscriber.

use tracing_subscriber::{fmt, EnvFilter};

use crate::types::{Error, Result};

/// Installs a formatting subscriber filtered by `filter` (`EnvFilter` syntax,
/// e.g. `"symatem=debug"` or `"diff=trace,info"`).
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_logging(filter: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(filter)
                .map_err(|e| Error::Precondition(format!("invalid log filter: {e}")))?,
        )
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|_| Error::Precondition("logging already initialized".into()))
}
