//! Exactly-once completion continuation.
//!
//! Registered at submission time and invoked by the cluster adapter's
//! completion path. The callback can only fire once per job handle:
//! the first `complete` call consumes it, later calls are no-ops.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use simgate_core::envelope::ResultEnvelope;

type CompletionFn =
    Box<dyn FnOnce(ResultEnvelope) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// A one-shot completion callback.
pub struct Continuation {
    inner: Mutex<Option<CompletionFn>>,
}

impl Continuation {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(ResultEnvelope) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: Mutex::new(Some(Box::new(move |envelope| Box::pin(f(envelope))))),
        }
    }

    /// Invoke the callback with the terminal envelope.
    ///
    /// Returns `true` if this call fired the callback, `false` if it had
    /// already fired.
    pub async fn complete(&self, envelope: ResultEnvelope) -> bool {
        let callback = self.inner.lock().expect("continuation lock poisoned").take();
        match callback {
            Some(f) => {
                f(envelope).await;
                true
            }
            None => {
                tracing::debug!(job_id = %envelope.job_id, "Completion already fired, ignoring");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use simgate_core::types::JobId;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fires_exactly_once() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = Arc::clone(&fired);

        let continuation = Continuation::new(move |_| {
            let fired = Arc::clone(&fired_clone);
            async move {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        });

        let envelope = ResultEnvelope::failure(JobId::new_v4(), "boom", 0.1);
        assert!(continuation.complete(envelope.clone()).await);
        assert!(!continuation.complete(envelope).await);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
