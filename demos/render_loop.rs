use frame_offload::{BufferPool, ResultSlot, TaskQueue};

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::info;

const WIDTH: usize = 160;
const HEIGHT: usize = 120;
const FRAME_BYTES: usize = WIDTH * HEIGHT * 4; // BGRA
const MASK_BYTES: usize = WIDTH * HEIGHT;

/// Stand-in for the segmentation model: one mask byte per pixel, thresholded
/// on the blue channel.
fn fake_inference(frame: &[u8], mask: &mut [u8]) {
  for (pixel, out) in frame.chunks_exact(4).zip(mask.iter_mut()) {
    *out = if pixel[0] > 127 { 255 } else { 0 };
  }
  // The real model is far slower than a render tick.
  std::thread::sleep(Duration::from_millis(12));
}

fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Render Loop Example ---");

  let pool = BufferPool::new(FRAME_BYTES, 64, 4).expect("pool config");
  let queue = TaskQueue::new("segmentation", 2);
  let (writer, mut reader) = ResultSlot::new(MASK_BYTES).split();

  // The worker is the only thread that ever locks the writer; tasks are
  // minted per frame on the render thread and each needs a way in.
  let writer = Arc::new(Mutex::new(writer));

  let mut tokens = Vec::new();
  let started = Instant::now();

  // A fixed-budget render loop: 120 frames at ~4 ms each. The inference
  // task takes ~12 ms, so most pushed frames get throttled away.
  for frame_index in 0..120u32 {
    let mut block = pool.acquire();
    // Synthetic capture: the frame brightens over time.
    block.fill((frame_index * 2) as u8);

    let writer = writer.clone();
    let token = queue
      .push(move |token| {
        if token.is_cancelled() {
          return;
        }
        let mut writer = writer.lock();
        writer.write(|mask| fake_inference(&block, mask));
      })
      .expect("queue accepts work while running");
    tokens.push(token);

    // Read back the latest mask without ever waiting on the worker.
    let mask = reader.read();
    let coverage = mask.iter().filter(|&&b| b > 0).count();
    if frame_index % 30 == 0 {
      info!(
        frame_index,
        coverage,
        pending = queue.len(),
        idle_blocks = pool.idle_blocks(),
        "Render tick."
      );
    }

    std::thread::sleep(Duration::from_millis(4));
  }

  drop(queue); // Drop shuts the queue down and joins the worker.

  let cancelled = tokens.iter().filter(|t| t.is_cancelled()).count();
  info!(
    elapsed_ms = started.elapsed().as_millis() as u64,
    pushed = tokens.len(),
    cancelled,
    executed_at_most = tokens.len() - cancelled,
    pool_allocations = pool.allocations(),
    "Loop finished; backlog was throttled to the newest frames."
  );
  info!("--- Render Loop Example End ---");
}
