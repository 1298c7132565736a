use frame_offload::{Block, BufferPool, OffloadError};

use std::thread;

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter =
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,frame_offload=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

#[test]
fn idle_set_is_bounded_and_excess_blocks_are_freed() {
  setup_tracing_for_test();
  let pool = BufferPool::new(1024, 64, 2).expect("valid pool config");

  let blocks: Vec<Block> = (0..5).map(|_| pool.acquire()).collect();
  assert_eq!(pool.allocations(), 5, "an empty idle set forces fresh allocations");
  assert_eq!(pool.idle_blocks(), 0);

  drop(blocks);
  assert_eq!(
    pool.idle_blocks(),
    2,
    "at most max_idle blocks may be retained; the rest are freed"
  );
}

#[test]
fn released_blocks_are_reused_without_reallocating() {
  setup_tracing_for_test();
  let pool = BufferPool::new(4096, 64, 4).expect("valid pool config");

  let block = pool.acquire();
  assert_eq!(pool.allocations(), 1);
  drop(block);
  assert_eq!(pool.idle_blocks(), 1);

  let _block = pool.acquire();
  assert_eq!(pool.allocations(), 1, "a pooled block must be reused, not reallocated");
  assert_eq!(pool.idle_blocks(), 0);
}

#[test]
fn pool_teardown_with_blocks_still_in_flight() {
  setup_tracing_for_test();
  let pool = BufferPool::new(1024, 64, 2).expect("valid pool config");
  let mut block = pool.acquire();

  // Pool goes away first; the outstanding block must stay fully usable and
  // then free itself on release.
  drop(pool);
  block.fill(0x5A);
  assert!(block.iter().all(|&b| b == 0x5A));
  drop(block);
}

#[test]
fn blocks_move_across_threads() {
  setup_tracing_for_test();
  let pool = BufferPool::new(1024, 64, 2).expect("valid pool config");
  let mut block = pool.acquire();
  block[0] = 42;

  let handle = thread::spawn(move || {
    assert_eq!(block[0], 42);
    drop(block);
  });
  handle.join().expect("worker thread panicked");

  assert_eq!(pool.idle_blocks(), 1, "a block released on another thread still returns");
}

#[test]
fn configuration_errors_fail_fast() {
  setup_tracing_for_test();
  assert_eq!(BufferPool::new(0, 64, 2).unwrap_err(), OffloadError::ZeroBlockSize);
  assert_eq!(
    BufferPool::new(1024, 48, 2).unwrap_err(),
    OffloadError::AlignmentNotPowerOfTwo(48)
  );
  assert_eq!(
    BufferPool::new(1000, 64, 2).unwrap_err(),
    OffloadError::MisalignedBlockSize {
      size: 1000,
      alignment: 64
    }
  );
  assert_eq!(BufferPool::new(1024, 64, 0).unwrap_err(), OffloadError::ZeroMaxIdle);
}

#[test]
fn acquired_blocks_match_the_configured_geometry() {
  setup_tracing_for_test();
  let pool = BufferPool::new(8192, 4096, 2).expect("valid pool config");
  assert_eq!(pool.block_size(), 8192);
  assert_eq!(pool.alignment(), 4096);

  let block = pool.acquire();
  assert_eq!(block.len(), 8192);
  assert_eq!(block.as_ptr() as usize % 4096, 0, "block must honour the pool alignment");
}
