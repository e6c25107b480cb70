use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::TryReserveError;
use std::sync::Arc;
use std::time::Duration;

/// Best-effort memory reclamation, run once before an allocation is retried.
///
/// Any `Fn()` closure is a reclamation hook, e.g. one that drops in-memory
/// caches held elsewhere in the process.
pub trait Reclaim: Send + Sync {
    fn reclaim(&self);
}

impl<F: Fn() + Send + Sync> Reclaim for F {
    fn reclaim(&self) {
        self()
    }
}

/// Reclamation hook that releases nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoReclaim;

impl Reclaim for NoReclaim {
    fn reclaim(&self) {}
}

/// Reclamation hook that pauses the current (blocking) thread, giving
/// concurrent reads a chance to finish and release their buffers.
#[derive(Clone, Copy, Debug)]
pub struct Backoff(pub Duration);

impl Default for Backoff {
    fn default() -> Self {
        Self(Duration::from_millis(50))
    }
}

impl Reclaim for Backoff {
    fn reclaim(&self) {
        tracing::debug!(delay_ms = self.0.as_millis() as u64, "Backing off before retrying allocation");
        std::thread::sleep(self.0);
    }
}

pub type ReclaimHandle = Arc<dyn Reclaim>;

/// Run `attempt`; on failure reclaim once and run it again. A second failure
/// is permanent and reported as an out-of-memory I/O error.
pub(crate) fn with_retry<T>(
    reclaim: &dyn Reclaim,
    mut attempt: impl FnMut() -> std::result::Result<T, TryReserveError>,
) -> Result<T> {
    match attempt() {
        Ok(value) => return Ok(value),
        Err(err) => {
            tracing::debug!(error = %err, "Allocation failed, reclaiming before retry");
            reclaim.reclaim();
        },
    }
    attempt().or_raise(|| ErrorKind::Io(std::io::ErrorKind::OutOfMemory.into()))
}
