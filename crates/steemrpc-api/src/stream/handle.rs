use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

/// Cancellation handle for a stream.
///
/// `cancel` is idempotent and cascades to the upstream layer the stream was
/// built on. Clones share state.
#[derive(Clone, Default)]
pub struct StreamHandle {
    inner: Arc<HandleInner>,
}

#[derive(Default)]
struct HandleInner {
    cancelled: AtomicBool,
    notify: Notify,
    upstream: Mutex<Option<StreamHandle>>,
}

impl StreamHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop this stream and everything upstream of it.
    pub fn cancel(&self) {
        // flag first: attach() relies on it being visible before the upstream is taken
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
        let upstream = self
            .inner
            .upstream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the handle is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Chain `upstream` so that cancelling this handle cancels it too.
    pub(crate) fn attach(&self, upstream: StreamHandle) {
        let mut slot = self
            .inner
            .upstream
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            drop(slot);
            upstream.cancel();
        } else {
            *slot = Some(upstream);
        }
    }

    /// Cancel on error. Returns `true` if the error should still be delivered,
    /// i.e. the stream had not already been cancelled by its owner.
    pub(crate) fn terminate(&self) -> bool {
        let live = !self.is_cancelled();
        self.cancel();
        live
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
