//! Cancellable one-shot timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// A callback scheduled to run once after a delay on the current Tokio
/// runtime.
///
/// Cancelling, or dropping the timer, guarantees the callback will not start.
/// A callback that has already started is not interrupted.
#[derive(Debug)]
pub struct OneShotTimer {
    task: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

impl OneShotTimer {
    /// Schedule `callback` to run after `delay`.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a Tokio runtime.
    pub fn schedule<F>(delay: Duration, callback: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| Error::internal(format!("timer needs a Tokio runtime: {e}")))?;

        let cancelled = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&cancelled);
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !stop.load(Ordering::SeqCst) {
                callback();
            }
        });

        Ok(Self { task, cancelled })
    }

    /// Cancel the timer. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    /// Whether the callback has neither run nor been cancelled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst) && !self.task.is_finished()
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let (count, callback) = counter();
        let timer = OneShotTimer::schedule(Duration::from_millis(100), callback).unwrap();
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_callback() {
        let (count, callback) = counter();
        let timer = OneShotTimer::schedule(Duration::from_millis(100), callback).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_pending());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (count, callback) = counter();
        drop(OneShotTimer::schedule(Duration::from_millis(100), callback).unwrap());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_schedule_outside_runtime_fails() {
        let (_, callback) = counter();
        let err = OneShotTimer::schedule(Duration::from_millis(1), callback).unwrap_err();
        assert!(err.to_string().contains("Tokio runtime"));
    }
}
