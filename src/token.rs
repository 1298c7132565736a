use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag indicating that a queued unit of work should be skipped.
///
/// Clones share the same flag. Once set, the flag never reverts; there is
/// deliberately no API to reset it.
///
/// Cancellation is cooperative, not preemptive: the queue checks the token
/// once, immediately before invoking the task body, and a body that is
/// already running is never interrupted. Long-running bodies that care about
/// mid-task cancellation are expected to poll the token themselves.
#[derive(Clone, Default)]
pub struct CancellationToken {
  cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
  /// Creates a new, uncancelled token.
  pub fn new() -> Self {
    Self::default()
  }

  /// Requests cancellation. Idempotent.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
  }

  /// Returns `true` once `cancel` has been called on any clone.
  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::Acquire)
  }
}

impl fmt::Debug for CancellationToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CancellationToken")
      .field("cancelled", &self.is_cancelled())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clones_share_the_flag() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());
    token.cancel();
    assert!(clone.is_cancelled());
  }

  #[test]
  fn cancel_is_idempotent() {
    let token = CancellationToken::new();
    token.cancel();
    token.cancel();
    assert!(token.is_cancelled());
  }
}
