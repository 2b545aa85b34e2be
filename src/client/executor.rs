//! Worker pool running submitted work off the caller's task.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::MpdError;

type Job = BoxFuture<'static, ()>;

/// Explicitly owned pool of worker tasks.
///
/// Jobs are taken from a shared FIFO channel. After [`Executor::shutdown`]
/// new work is refused with [`MpdError::Shutdown`] and queued work is
/// dropped.
pub struct Executor {
  jobs: async_channel::Sender<Job>,
  shutdown: CancellationToken,
  workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Executor {
  /// Spawn `workers` worker tasks on the current Tokio runtime.
  pub fn new(workers: usize) -> Self {
    let (jobs, queue) = async_channel::unbounded::<Job>();
    let shutdown = CancellationToken::new();

    let handles = (0..workers.max(1))
      .map(|id| {
        let queue = queue.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
          log::debug!("MPD worker {} started", id);
          loop {
            tokio::select! {
              _ = shutdown.cancelled() => break,
              job = queue.recv() => match job {
                Ok(job) => {
                  tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = job => {}
                  }
                }
                Err(_) => break,
              }
            }
          }
          log::debug!("MPD worker {} stopped", id);
        })
      })
      .collect();

    Self {
      jobs,
      shutdown,
      workers: Mutex::new(handles),
    }
  }

  /// Run `future` on a worker. Cancelling `cancel` resolves the task to
  /// [`MpdError::Cancelled`] and drops the future.
  pub fn spawn<T, F>(&self, cancel: CancellationToken, future: F) -> Task<T>
  where
    T: Send + 'static,
    F: Future<Output = Result<T, MpdError>> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    let task = Task {
      rx,
      cancel: cancel.clone(),
    };

    if self.shutdown.is_cancelled() {
      let _ = tx.send(Err(MpdError::Shutdown));
      return task;
    }

    let job: Job = Box::pin(async move {
      let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MpdError::Cancelled),
        result = future => result,
      };
      let _ = tx.send(result);
    });
    if self.jobs.try_send(job).is_err() {
      // The job and its sender are gone; the task resolves to Shutdown.
      log::warn!("Rejected work after executor shutdown");
    }
    task
  }

  pub fn is_shut_down(&self) -> bool {
    self.shutdown.is_cancelled()
  }

  /// Stop all workers and wait for them to exit.
  pub async fn shutdown(&self) {
    if self.shutdown.is_cancelled() {
      return;
    }
    log::info!("Shutting down MPD executor");
    self.shutdown.cancel();
    self.jobs.close();
    let handles = std::mem::take(&mut *self.workers.lock());
    for handle in handles {
      if let Err(e) = handle.await {
        log::error!("MPD worker panicked: {}", e);
      }
    }
  }
}

impl Drop for Executor {
  fn drop(&mut self) {
    self.shutdown.cancel();
    self.jobs.close();
  }
}

/// Handle to submitted work; completes exactly once.
#[must_use = "a Task does nothing unless awaited or cancelled"]
pub struct Task<T> {
  rx: oneshot::Receiver<Result<T, MpdError>>,
  cancel: CancellationToken,
}

impl<T> Task<T> {
  /// Cancel the work. A command not yet sent is never sent; a result that
  /// arrives afterwards is discarded.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Token observed by the queue and the worker running this task.
  pub fn cancel_token(&self) -> CancellationToken {
    self.cancel.clone()
  }
}

impl<T> Future for Task<T> {
  type Output = Result<T, MpdError>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    if self.cancel.is_cancelled() {
      return Poll::Ready(Err(MpdError::Cancelled));
    }
    match Pin::new(&mut self.rx).poll(cx) {
      Poll::Ready(Ok(result)) => Poll::Ready(result),
      Poll::Ready(Err(_)) => Poll::Ready(Err(MpdError::Shutdown)),
      Poll::Pending => Poll::Pending,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_spawn_returns_result() {
    let executor = Executor::new(2);
    let task = executor.spawn(CancellationToken::new(), async { Ok(21 * 2) });
    assert_eq!(task.await.unwrap(), 42);
  }

  #[tokio::test]
  async fn test_cancel_pending_task() {
    let executor = Executor::new(1);
    let task = executor.spawn(CancellationToken::new(), async {
      tokio::time::sleep(Duration::from_secs(30)).await;
      Ok(())
    });
    task.cancel();
    assert!(matches!(task.await, Err(MpdError::Cancelled)));
  }

  #[tokio::test]
  async fn test_cancel_discards_finished_result() {
    let executor = Executor::new(1);
    let task = executor.spawn(CancellationToken::new(), async { Ok("done") });
    tokio::time::sleep(Duration::from_millis(20)).await;
    task.cancel();
    assert!(matches!(task.await, Err(MpdError::Cancelled)));
  }

  #[tokio::test]
  async fn test_errors_pass_through() {
    let executor = Executor::new(1);
    let task: Task<()> = executor.spawn(CancellationToken::new(), async {
      Err(MpdError::Parse("bad".into()))
    });
    assert!(matches!(task.await, Err(MpdError::Parse(_))));
  }

  #[tokio::test]
  async fn test_spawn_after_shutdown() {
    let executor = Executor::new(2);
    executor.shutdown().await;
    assert!(executor.is_shut_down());
    let task = executor.spawn(CancellationToken::new(), async { Ok(1) });
    assert!(matches!(task.await, Err(MpdError::Shutdown)));
  }
}
