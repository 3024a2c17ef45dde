//! Bridge from the blocking engine to async callers

use cask_core::CaskError;
use std::io;

use crate::CacheResult;

/// Run a blocking cache operation on tokio's blocking pool.
///
/// The operation runs to completion even if the returned future is dropped,
/// so a cancelled caller never leaves a half-finished write behind.
pub(crate) async fn unblock<T, F>(op: F) -> CacheResult<T>
where
    F: FnOnce() -> CacheResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op).await.map_err(|e| {
        CaskError::io(
            "Blocking cache task did not complete",
            io::Error::new(io::ErrorKind::Other, e),
        )
    })?
}
