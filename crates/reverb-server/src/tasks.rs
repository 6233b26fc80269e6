use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinSet;

/// Registry of background cache writes that outlive their requests.
///
/// The server drains it on shutdown so in-flight commits get a bounded
/// grace period before the process exits.
pub struct BackgroundTasks {
    inner: Mutex<JoinSet<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(JoinSet::new()),
        }
    }

    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.inner.lock().expect("task registry poisoned");
        // Reap whatever already finished so the set stays small.
        while set.try_join_next().is_some() {}
        set.spawn(future);
    }

    /// Number of tasks not yet reaped.
    pub fn outstanding(&self) -> usize {
        self.inner.lock().expect("task registry poisoned").len()
    }

    /// Join every outstanding task, aborting whatever is still running when
    /// the deadline fires.
    pub async fn shutdown(&self, deadline: Duration) {
        let mut set = std::mem::take(&mut *self.inner.lock().expect("task registry poisoned"));
        if set.is_empty() {
            return;
        }

        let drained = tokio::time::timeout(deadline, async {
            while set.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                "background writes still running after {:?}, aborting {}",
                deadline,
                set.len()
            );
            set.abort_all();
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn shutdown_waits_for_spawned_work() {
        let tasks = BackgroundTasks::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        tasks.spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        tasks.shutdown(Duration::from_secs(5)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shutdown_aborts_after_deadline() {
        let tasks = BackgroundTasks::new();
        tasks.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        // Returns promptly instead of hanging on the sleeper.
        tasks.shutdown(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn shutdown_on_empty_registry_is_immediate() {
        let tasks = BackgroundTasks::new();
        tasks.shutdown(Duration::from_secs(5)).await;
        assert_eq!(tasks.outstanding(), 0);
    }
}
