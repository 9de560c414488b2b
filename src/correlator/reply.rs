//! Pending result of a correlated call.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::JobId;

use super::core::Inner;

// ============================================================================
// Reply
// ============================================================================

/// Future resolving with the native side's answer to one call.
///
/// The call is registered when the `Reply` is created, not when it is first
/// polled, so dropping a `Reply` does not retract the call.
///
/// Resolves with [`Error::Abandoned`] if the job is dropped without an
/// answer (correlator destroyed, or [`Correlator::die`](super::Correlator::die)
/// called with [`Reply::id`]). Unbinding the bridge does not abandon jobs: a
/// late answer through `dequeue` still resolves the reply.
#[must_use = "a Reply does nothing unless awaited"]
pub struct Reply<T> {
    id: JobId,
    rx: oneshot::Receiver<T>,
    owner: Weak<Inner>,
}

impl<T> Reply<T> {
    pub(super) fn new(id: JobId, rx: oneshot::Receiver<T>, owner: Weak<Inner>) -> Self {
        Self { id, rx, owner }
    }

    /// Returns the correlation id of the call.
    ///
    /// The id is assigned up front, even while the call is still waiting for
    /// a bridge to be bound.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Waits for the answer at most `duration`.
    ///
    /// On timeout the job is removed, so a late answer is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if no answer arrived in time
    /// - [`Error::Abandoned`] if the job was dropped
    pub async fn timeout(self, duration: Duration) -> Result<T> {
        let id = self.id.clone();
        let owner = self.owner.clone();

        match timeout(duration, self).await {
            Ok(result) => result,
            Err(_) => {
                if let Some(inner) = owner.upgrade() {
                    inner.jobs.lock().remove(id.as_str());
                }
                debug!(job_id = %id, "Call timed out, job removed");
                Err(Error::timeout_after(id, duration))
            }
        }
    }
}

impl<T> Unpin for Reply<T> {}

impl<T> Future for Reply<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.rx
            .poll_unpin(cx)
            .map(|result| result.map_err(|_| Error::abandoned(this.id.clone())))
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
