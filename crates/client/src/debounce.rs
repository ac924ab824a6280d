//! Keyed debouncer: scheduling a task for a key aborts the one still pending for it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay` unless `key` is scheduled again first.
    ///
    /// Must be called from within a tokio runtime. Only the timer is
    /// cancellable: once it fires, `task` is detached and runs to completion.
    pub fn schedule<F>(&self, key: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(task);
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.insert(key.to_string(), handle) {
            previous.abort();
            tracing::trace!(key, "Debounced task replaced");
        }
    }

    /// Whether the timer for `key` is still waiting to fire.
    pub fn is_pending(&self, key: &str) -> bool {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.get(key).is_some_and(|h| !h.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_cancels_previous() {
        let debouncer = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let runs = runs.clone();
            debouncer.schedule("feed", Duration::from_millis(250), async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(debouncer.is_pending("feed"));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending("feed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let debouncer = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for key in ["a", "b"] {
            let runs = runs.clone();
            debouncer.schedule(key, Duration::from_millis(250), async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
