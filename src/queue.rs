use crate::error::OffloadError;
use crate::token::CancellationToken;

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace, warn};

/// The type of closure the queue executes. The token passed in is the same
/// one [`TaskQueue::push`] returned for this task.
pub type TaskBody = Box<dyn FnOnce(&CancellationToken) + Send + 'static>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);

/// A task waiting in the FIFO. The token is kept beside the body so the
/// queue can cancel an entry without invoking it.
struct QueuedTask {
  task_id: u64,
  body: TaskBody,
  token: CancellationToken,
}

struct QueueState {
  fifo: VecDeque<QueuedTask>,
  /// Token of the task the worker is currently executing, if any, so
  /// shutdown can cancel an in-flight task.
  current: Option<CancellationToken>,
  stopping: bool,
}

struct QueueShared {
  state: Mutex<QueueState>,
  wakeup: Condvar,
}

/// A bounded FIFO of cancellable tasks executed one at a time by a single
/// dedicated worker thread.
///
/// Pushing past capacity cancels and discards the oldest pending entry, so
/// under sustained overload the backlog always collapses to the newest
/// tasks — the right throttling behaviour for a live-frame pipeline, where
/// stale frames are worthless. Shutdown cancels everything still pending
/// plus the in-flight task's token and joins the worker deterministically.
pub struct TaskQueue {
  name: Arc<String>,
  max_queue_size: usize,
  shared: Arc<QueueShared>,
  worker: Option<JoinHandle<()>>,
}

impl TaskQueue {
  /// Launches the dedicated worker thread and returns the queue in the
  /// running state.
  ///
  /// `max_queue_size` bounds the number of pending tasks and is clamped to
  /// at least 1. With a bound of 1 every push cancels the previously
  /// pending task, throttling the backlog to "latest only".
  pub fn new(name: &str, max_queue_size: usize) -> Self {
    let max_queue_size = max_queue_size.max(1);
    let name = Arc::new(name.to_string());
    let shared = Arc::new(QueueShared {
      state: Mutex::new(QueueState {
        fifo: VecDeque::new(),
        current: None,
        stopping: false,
      }),
      wakeup: Condvar::new(),
    });

    let worker_name = name.clone();
    let worker_shared = shared.clone();
    let worker = thread::Builder::new()
      .name(format!("offload-{name}"))
      .spawn(move || Self::run_worker_loop(worker_name, worker_shared))
      .expect("failed to spawn offload worker thread");

    info!(queue = %name, max_queue_size, "Worker thread launched.");

    Self {
      name,
      max_queue_size,
      shared,
      worker: Some(worker),
    }
  }

  /// Appends a task and returns its cancellation token.
  ///
  /// While the queue is at capacity, the oldest pending entry is cancelled
  /// and discarded first — never the entry being pushed. The returned token
  /// is the same one the body will receive, so callers can cancel
  /// explicitly even before the queue is full.
  ///
  /// Never blocks on the worker; the lock is held only across the O(1)
  /// queue manipulation.
  ///
  /// # Errors
  ///
  /// Returns [`OffloadError::QueueStopped`] once shutdown has begun. The
  /// task is not queued and no state changes.
  pub fn push<F>(&self, body: F) -> Result<CancellationToken, OffloadError>
  where
    F: FnOnce(&CancellationToken) + Send + 'static,
  {
    let mut state = self.shared.state.lock();
    if state.stopping {
      warn!(queue = %self.name, "Push rejected: queue is stopping or stopped.");
      return Err(OffloadError::QueueStopped);
    }

    let task_id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
    let token = CancellationToken::new();

    while state.fifo.len() >= self.max_queue_size {
      // Overload: collapse the backlog from the front so only the newest
      // entries survive.
      if let Some(evicted) = state.fifo.pop_front() {
        evicted.token.cancel();
        debug!(
          queue = %self.name,
          task_id = evicted.task_id,
          "Evicted oldest pending task at capacity."
        );
      }
    }

    state.fifo.push_back(QueuedTask {
      task_id,
      body: Box::new(body),
      token: token.clone(),
    });
    trace!(queue = %self.name, %task_id, pending = state.fifo.len(), "Task queued.");
    drop(state);
    self.shared.wakeup.notify_one();

    Ok(token)
  }

  /// Cancels every pending task and the in-flight task's token, stops
  /// accepting new work, and blocks until the worker thread has exited.
  ///
  /// Idempotent and infallible; the call from `Drop` makes destruction
  /// equivalent to an explicit shutdown. An in-flight body is never
  /// interrupted — shutdown waits for it to return.
  pub fn shutdown(&mut self) {
    {
      let mut state = self.shared.state.lock();
      if !state.stopping {
        state.stopping = true;
        info!(queue = %self.name, pending = state.fifo.len(), "Shutdown initiated.");
        for task in state.fifo.drain(..) {
          task.token.cancel();
          debug!(
            queue = %self.name,
            task_id = task.task_id,
            "Cancelled pending task during shutdown."
          );
        }
        if let Some(current) = &state.current {
          current.cancel();
          debug!(queue = %self.name, "Cancelled in-flight task token during shutdown.");
        }
      }
    }
    self.shared.wakeup.notify_all();

    if let Some(worker) = self.worker.take() {
      if worker.join().is_err() {
        // The loop catches body panics; a join error means the loop itself
        // panicked.
        error!(queue = %self.name, "Worker thread panicked before exiting.");
      } else {
        info!(queue = %self.name, "Worker thread joined.");
      }
    }
  }

  /// Number of tasks currently pending, excluding any in-flight task.
  pub fn len(&self) -> usize {
    self.shared.state.lock().fifo.len()
  }

  /// Returns `true` when no tasks are pending.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The name this queue logs under.
  pub fn name(&self) -> &str {
    &self.name
  }

  fn run_worker_loop(name: Arc<String>, shared: Arc<QueueShared>) {
    info!(queue = %name, "Worker loop started.");

    loop {
      let task = {
        let mut state = shared.state.lock();
        loop {
          if let Some(task) = state.fifo.pop_front() {
            state.current = Some(task.token.clone());
            break task;
          }
          if state.stopping {
            info!(queue = %name, "Stopping and drained. Worker loop terminating.");
            return;
          }
          shared.wakeup.wait(&mut state);
        }
      };

      if task.token.is_cancelled() {
        debug!(
          queue = %name,
          task_id = task.task_id,
          "Dequeued task already cancelled, skipping body."
        );
      } else {
        trace!(queue = %name, task_id = task.task_id, "Executing task body.");
        let token = task.token.clone();
        let body = task.body;
        // One failing body must never take the worker down with it, and
        // never cancels sibling tasks.
        if panic::catch_unwind(AssertUnwindSafe(move || body(&token))).is_err() {
          error!(
            queue = %name,
            task_id = task.task_id,
            "Task body panicked; worker continues."
          );
        }
      }

      shared.state.lock().current = None;
    }
  }
}

impl Drop for TaskQueue {
  fn drop(&mut self) {
    self.shutdown();
  }
}

impl fmt::Debug for TaskQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskQueue")
      .field("name", &self.name)
      .field("max_queue_size", &self.max_queue_size)
      .field("pending", &self.len())
      .finish_non_exhaustive()
  }
}
