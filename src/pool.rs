use crate::error::OffloadError;

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::fmt;
use std::mem::{self, ManuallyDrop};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

/// Smallest alignment the pool accepts. Covers the largest natural scalar
/// alignment, so a block can back any primitive layout.
const MIN_ALIGNMENT: usize = mem::align_of::<u128>();

/// A raw fixed-size, fixed-alignment heap buffer.
///
/// Ownership moves between the pool's idle list and the `Block` handles in
/// flight; the memory is freed when a `RawBlock` is dropped, wherever that
/// happens.
struct RawBlock {
  ptr: NonNull<u8>,
  layout: Layout,
}

// SAFETY: RawBlock exclusively owns its allocation; nothing else aliases it.
unsafe impl Send for RawBlock {}

impl RawBlock {
  /// Allocates a zero-initialised buffer. Allocation failure is routed to
  /// the global allocation-error hook; it is fatal and not retried.
  fn allocate(layout: Layout) -> Self {
    // SAFETY: layout has non-zero size and power-of-two alignment, both
    // enforced by `BufferPool::new`.
    let ptr = unsafe { alloc_zeroed(layout) };
    let Some(ptr) = NonNull::new(ptr) else {
      handle_alloc_error(layout);
    };
    Self { ptr, layout }
  }
}

impl Drop for RawBlock {
  fn drop(&mut self) {
    // SAFETY: ptr was allocated with exactly this layout in `allocate`.
    unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
  }
}

struct PoolInner {
  idle: Mutex<Vec<RawBlock>>,
  layout: Layout,
  max_idle: usize,
  /// Fresh heap allocations performed over the pool's lifetime.
  allocations: AtomicU64,
}

impl PoolInner {
  /// Infallible by design: at worst the block is freed instead of pooled.
  fn release(&self, raw: RawBlock) {
    let mut idle = self.idle.lock();
    if idle.len() < self.max_idle {
      idle.push(raw);
    }
    // At capacity the block falls out of scope here and is freed.
  }
}

/// Hands out same-size, same-alignment memory blocks and retains a bounded
/// idle set for reuse.
///
/// Blocks self-return: dropping a [`Block`] pushes its buffer back onto the
/// idle list, or frees it when the list already holds `max_idle` entries.
/// Each handle references the pool weakly, so a pool dropped while blocks
/// are still circulating is safe; the stragglers free themselves on release
/// instead of writing into freed pool state.
pub struct BufferPool {
  inner: Arc<PoolInner>,
}

impl BufferPool {
  /// Creates a pool of `block_size`-byte blocks aligned to `alignment`,
  /// retaining at most `max_idle` idle blocks for reuse.
  ///
  /// # Errors
  ///
  /// Fails fast on invalid configuration: a zero block size or idle bound,
  /// an alignment that is not a power of two or is below the platform's
  /// natural alignment, or a block size that is not a multiple of the
  /// alignment.
  pub fn new(block_size: usize, alignment: usize, max_idle: usize) -> Result<Self, OffloadError> {
    if block_size == 0 {
      return Err(OffloadError::ZeroBlockSize);
    }
    if !alignment.is_power_of_two() {
      return Err(OffloadError::AlignmentNotPowerOfTwo(alignment));
    }
    if alignment < MIN_ALIGNMENT {
      return Err(OffloadError::AlignmentTooSmall {
        got: alignment,
        min: MIN_ALIGNMENT,
      });
    }
    if block_size % alignment != 0 {
      return Err(OffloadError::MisalignedBlockSize {
        size: block_size,
        alignment,
      });
    }
    if max_idle == 0 {
      return Err(OffloadError::ZeroMaxIdle);
    }

    let layout = Layout::from_size_align(block_size, alignment)
      .map_err(|_| OffloadError::OversizedBlock(block_size))?;

    Ok(Self {
      inner: Arc::new(PoolInner {
        idle: Mutex::new(Vec::with_capacity(max_idle)),
        layout,
        max_idle,
        allocations: AtomicU64::new(0),
      }),
    })
  }

  /// Takes a block from the idle set, or allocates a fresh zero-initialised
  /// one when the set is empty.
  ///
  /// Blocks only on the pool's internal lock; the allocation fallback runs
  /// with no lock held. A reused block keeps whatever bytes its previous
  /// user left in it.
  pub fn acquire(&self) -> Block {
    let reused = self.inner.idle.lock().pop();
    let raw = match reused {
      Some(raw) => raw,
      None => {
        self.inner.allocations.fetch_add(1, Ordering::Relaxed);
        trace!(
          block_size = self.inner.layout.size(),
          "Idle set empty, allocating fresh block."
        );
        RawBlock::allocate(self.inner.layout)
      }
    };
    Block {
      raw: ManuallyDrop::new(raw),
      pool: Arc::downgrade(&self.inner),
    }
  }

  /// Number of idle blocks currently retained for reuse.
  pub fn idle_blocks(&self) -> usize {
    self.inner.idle.lock().len()
  }

  /// Total fresh heap allocations performed by this pool.
  pub fn allocations(&self) -> u64 {
    self.inner.allocations.load(Ordering::Relaxed)
  }

  /// Size in bytes of every block handed out.
  pub fn block_size(&self) -> usize {
    self.inner.layout.size()
  }

  /// Alignment in bytes of every block handed out.
  pub fn alignment(&self) -> usize {
    self.inner.layout.align()
  }
}

impl fmt::Debug for BufferPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BufferPool")
      .field("block_size", &self.inner.layout.size())
      .field("alignment", &self.inner.layout.align())
      .field("max_idle", &self.inner.max_idle)
      .field("idle", &self.idle_blocks())
      .finish_non_exhaustive()
  }
}

/// A fixed-size, fixed-alignment byte buffer on loan from a [`BufferPool`].
///
/// Dereferences to `[u8]`. On drop the buffer returns to the owning pool's
/// idle set, or is freed when the set is full or the pool no longer exists.
/// Either way the memory is released exactly once.
pub struct Block {
  raw: ManuallyDrop<RawBlock>,
  pool: Weak<PoolInner>,
}

impl Deref for Block {
  type Target = [u8];

  fn deref(&self) -> &[u8] {
    // SAFETY: the allocation is live for the handle's lifetime and was
    // zero-initialised over its full layout size.
    unsafe { slice::from_raw_parts(self.raw.ptr.as_ptr(), self.raw.layout.size()) }
  }
}

impl DerefMut for Block {
  fn deref_mut(&mut self) -> &mut [u8] {
    // SAFETY: same as `deref`; the handle has exclusive ownership.
    unsafe { slice::from_raw_parts_mut(self.raw.ptr.as_ptr(), self.raw.layout.size()) }
  }
}

impl Drop for Block {
  fn drop(&mut self) {
    // SAFETY: raw is taken exactly once, here.
    let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
    match self.pool.upgrade() {
      Some(pool) => pool.release(raw),
      // Pool already torn down; the block frees itself.
      None => drop(raw),
    }
  }
}

impl fmt::Debug for Block {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Block")
      .field("len", &self.raw.layout.size())
      .field("align", &self.raw.layout.align())
      .finish_non_exhaustive()
  }
}
