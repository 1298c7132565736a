use frame_offload::TaskQueue;

use std::time::Duration;

use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Overflow Throttling Example ---");

  // Capacity 1: each push cancels the previously pending task, so the
  // backlog degenerates to "latest only".
  let queue = TaskQueue::new("throttled", 1);

  let mut tokens = Vec::new();
  for i in 0..20u32 {
    let token = queue
      .push(move |token| {
        if token.is_cancelled() {
          return;
        }
        info!(task = i, "Slow task executing.");
        std::thread::sleep(Duration::from_millis(30));
      })
      .expect("push while running");
    tokens.push((i, token));
    std::thread::sleep(Duration::from_millis(5));
  }

  // Let the last survivor finish before tearing the queue down.
  std::thread::sleep(Duration::from_millis(60));
  drop(queue);

  let cancelled: Vec<u32> = tokens
    .iter()
    .filter(|(_, t)| t.is_cancelled())
    .map(|(i, _)| *i)
    .collect();
  info!(
    pushed = tokens.len(),
    cancelled = cancelled.len(),
    "Most tasks were evicted before running: {:?}",
    cancelled
  );
  info!("--- Overflow Throttling Example End ---");
}
