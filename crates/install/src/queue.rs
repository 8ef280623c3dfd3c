//! The serial install queue
//!
//! Every install pipeline runs through this queue: a pipeline does not
//! start until the previous one has reached its terminal state, so user
//! dialogs from two installs can never interleave. The queue is a chain
//! of futures, not a stack — each `enqueue` call links onto the tail left
//! by the previous caller and installs its own completion handle as the
//! new tail.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

/// A linear chain of pipeline executions.
#[derive(Default)]
pub struct InstallQueue {
    tail: Mutex<Option<Shared<BoxFuture<'static, ()>>>>,
}

impl InstallQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the chain and run it once every previously
    /// enqueued task has finished. Completion is signalled through a drop
    /// guard, so a panicking or cancelled task cannot wedge the chain.
    pub async fn enqueue<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let done: Shared<BoxFuture<'static, ()>> = done_rx.map(|_| ()).boxed().shared();

        let previous = {
            let mut tail = self
                .tail
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            tail.replace(done)
        };
        if let Some(previous) = previous {
            previous.await;
        }

        let _signal = CompletionGuard(Some(done_tx));
        task.await
    }
}

struct CompletionGuard(Option<oneshot::Sender<()>>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn tasks_run_strictly_in_order() {
        let queue = Arc::new(InstallQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let queue = Arc::clone(&queue);
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                queue
                    .enqueue(async move {
                        log.lock().unwrap().push((i, "start"));
                        // Yield so overlap would be observable.
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        log.lock().unwrap().push((i, "end"));
                    })
                    .await;
            }));
            // Give each task a chance to claim its place in the chain.
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let log = log.lock().unwrap();
        for pair in log.chunks(2) {
            assert_eq!(pair[0].0, pair[1].0, "task {} interleaved", pair[0].0);
            assert_eq!(pair[0].1, "start");
            assert_eq!(pair[1].1, "end");
        }
    }

    #[tokio::test]
    async fn at_most_one_task_is_active() {
        let queue = Arc::new(InstallQueue::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                queue
                    .enqueue(async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chain_survives_a_dropped_task() {
        let queue = Arc::new(InstallQueue::new());

        // Enqueue a task and cancel it while it waits.
        let q = Arc::clone(&queue);
        let blocked = tokio::spawn(async move {
            q.enqueue(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
            .await;
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        blocked.abort();
        let _ = blocked.await;

        // The chain must still make progress.
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            queue.enqueue(async { 42 }),
        )
        .await
        .expect("queue wedged by aborted task");
        assert_eq!(result, 42);
    }
}
