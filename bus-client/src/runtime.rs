//! Runtime used by the blocking facades.

use tokio::runtime::{Builder, Runtime};

use crate::error::{BusError, Result};

/// Build the single threaded runtime that sync APIs drive with `block_on`.
///
/// Do not call the resulting `block_on` from inside another tokio runtime.
pub fn blocking_runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            tracing::error!("Failed to create tokio runtime: {}", e);
            BusError::Runtime(e.to_string())
        })
}
