//! Async executor for bridging synchronous kernel callbacks with the async core.
//!
//! The executor owns a dedicated tokio runtime running on a background
//! thread. A callback submits a future and blocks on a oneshot receiver until
//! the result arrives, so no tokio worker thread is ever blocked.
//!
//! ```text
//! FUSE Thread                    Executor Thread
//! ───────────                    ───────────────
//!     │                               │
//!     │ submit(future) ──────────────►│
//!     │                               │ spawn task
//!     │ blocking_recv() ◄─────────────│ send result
//!     │                               │
//! ```
//!
//! Every call can carry a deadline and observes a shared cancellation token.
//! When either fires, the in-flight future (and the store request inside it)
//! is dropped and the caller gets an `ExecutorError`.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Errors that can occur while running a bridged call.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// The executor has been shut down or the background thread died.
    #[error("Executor has been shut down")]
    Shutdown,
    /// The call was cancelled.
    #[error("Operation was cancelled")]
    Cancelled,
    /// The call did not finish before its deadline.
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// The deadline that was exceeded.
        duration: Duration,
    },
}

/// Configuration for the async executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of tokio worker threads.
    pub worker_threads: usize,
    /// Channel buffer size for work submission.
    pub queue_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            queue_size: 1024,
        }
    }
}

impl ExecutorConfig {
    /// Set the number of worker threads.
    ///
    /// # Arguments
    /// * `worker_threads` - Number of tokio worker threads
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Set the submission queue size.
    ///
    /// # Arguments
    /// * `queue_size` - Channel buffer size for work submission
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }
}

/// Async executor running on a dedicated background thread.
pub struct AsyncExecutor {
    /// Channel to submit work.
    tx: mpsc::Sender<BoxFuture<'static, ()>>,
    /// Cancels every in-flight call.
    cancel_token: CancellationToken,
    /// Handle to the background thread.
    thread: Option<JoinHandle<()>>,
    /// Whether the background loop is still running.
    running: Arc<AtomicBool>,
}

impl AsyncExecutor {
    /// Create an executor and start its runtime thread.
    ///
    /// # Arguments
    /// * `config` - Executor configuration
    ///
    /// # Returns
    /// The running executor, or the error from building the runtime or
    /// spawning its thread.
    pub fn new(config: ExecutorConfig) -> std::io::Result<Self> {
        let runtime: tokio::runtime::Runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("kvfs-io-worker")
            .enable_all()
            .build()?;

        let (tx, mut rx) = mpsc::channel::<BoxFuture<'static, ()>>(config.queue_size);
        let cancel_token = CancellationToken::new();
        let token_clone: CancellationToken = cancel_token.clone();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone: Arc<AtomicBool> = running.clone();

        let thread: JoinHandle<()> = std::thread::Builder::new()
            .name("kvfs-async-executor".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    loop {
                        tokio::select! {
                            biased;

                            _ = token_clone.cancelled() => break,
                            item = rx.recv() => match item {
                                Some(work) => {
                                    tokio::spawn(work);
                                }
                                None => break,
                            },
                        }
                    }
                });
                running_clone.store(false, Ordering::Release);
            })?;

        Ok(Self {
            tx,
            cancel_token,
            thread: Some(thread),
            running,
        })
    }

    /// Create an executor with default settings.
    pub fn with_defaults() -> std::io::Result<Self> {
        Self::new(ExecutorConfig::default())
    }

    /// Run a future to completion and block until it finishes.
    ///
    /// # Arguments
    /// * `future` - The async operation to execute
    ///
    /// # Returns
    /// Ok(result) on success, Err(Shutdown) if the executor is gone.
    pub fn block_on<F, T>(&self, future: F) -> Result<T, ExecutorError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if !self.running.load(Ordering::Acquire) {
            return Err(ExecutorError::Shutdown);
        }

        let (result_tx, result_rx) = oneshot::channel::<T>();
        let work: BoxFuture<'static, ()> = async move {
            // Caller may have gone away
            let _ = result_tx.send(future.await);
        }
        .boxed();

        if self.tx.blocking_send(work).is_err() {
            return Err(ExecutorError::Shutdown);
        }

        // Plain channel wait, not a runtime block_on
        result_rx.blocking_recv().map_err(|_| ExecutorError::Shutdown)
    }

    /// Run a future under a deadline, aborting it on cancellation.
    ///
    /// # Arguments
    /// * `future` - The async operation to execute
    /// * `timeout` - Maximum time to wait for completion
    ///
    /// # Returns
    /// Ok(result) if completed, Err(Timeout) or Err(Cancelled) otherwise.
    pub fn block_on_cancellable_timeout<F, T>(
        &self,
        future: F,
        timeout: Duration,
    ) -> Result<T, ExecutorError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let token: CancellationToken = self.cancel_token.clone();

        let wrapped = async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(ExecutorError::Cancelled),
                result = tokio::time::timeout(timeout, future) => {
                    result.map_err(|_| ExecutorError::Timeout { duration: timeout })
                }
            }
        };

        self.block_on(wrapped)?
    }

    /// Cancel all in-flight operations and stop accepting work.
    ///
    /// Called on unmount.
    pub fn cancel_all(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the executor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Check if the executor is still running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for AsyncExecutor {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
