use frame_offload::TaskQueue;

use std::time::Duration;

use tracing::info;

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Shutdown Example ---");

  let mut queue = TaskQueue::new("shutdown_demo", 8);

  let mut tokens = Vec::new();
  for i in 0..5u32 {
    let token = queue
      .push(move |_| {
        info!(task = i, "Task running for 200 ms.");
        std::thread::sleep(Duration::from_millis(200));
        info!(task = i, "Task finished.");
      })
      .expect("push while running");
    tokens.push(token);
  }
  info!(pending = queue.len(), "Five tasks pushed; shutting down immediately.");

  // Cancels everything still pending, signals the in-flight task's token,
  // and returns only after the worker thread has exited.
  queue.shutdown();
  info!("Shutdown returned; worker has exited.");

  for (i, token) in tokens.iter().enumerate() {
    info!(task = i, cancelled = token.is_cancelled(), "Final token state.");
  }

  match queue.push(|_| info!("This never runs.")) {
    Ok(_) => info!("LATE PUSH ACCEPTED (UNEXPECTED!)"),
    Err(e) => info!("Late push correctly rejected: {e}"),
  }

  info!("--- Shutdown Example End ---");
}
