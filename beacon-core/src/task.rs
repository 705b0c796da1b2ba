//! Cancellable background tasks.
//!
//! Heartbeats, registry sweeps and discovery refreshes all run as tokio
//! tasks owned through a [`TaskHandle`]. The handle carries a stop signal;
//! dropping it signals the task as well.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Stop signal observed by a running task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Resolve once a stop was requested or the handle was dropped.
    pub async fn requested(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Check for a pending stop request without waiting.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

/// Owner of a spawned background loop.
#[derive(Debug)]
pub struct TaskHandle<T> {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<T>,
}

impl<T: Send + 'static> TaskHandle<T> {
    /// Spawn `f` on the current tokio runtime, handing it a [`Shutdown`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: FnOnce(Shutdown) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(f(Shutdown { rx }));
        tracing::debug!(task = name, "background task started");
        Self {
            name,
            shutdown,
            task,
        }
    }

    /// Name given at spawn time.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check whether the task already exited on its own.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task to stop and wait for its result.
    ///
    /// Returns `None` if the task panicked.
    pub async fn stop(self) -> Option<T> {
        // The task may already be gone; nothing left to signal then.
        let _ = self.shutdown.send(true);
        self.join().await
    }

    /// Wait for the task to exit without signalling it.
    ///
    /// Returns `None` if the task panicked.
    pub async fn join(self) -> Option<T> {
        let Self {
            name,
            shutdown,
            task,
        } = self;
        let result = task.await;
        drop(shutdown);
        match result {
            Ok(output) => {
                tracing::debug!(task = name, "background task exited");
                Some(output)
            }
            Err(e) => {
                tracing::error!(task = name, error = %e, "background task failed");
                None
            }
        }
    }
}
