use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

struct SlotShared {
  /// Three same-length buffers. At any instant each index is owned by
  /// exactly one of {writer, reader, fresh}.
  buffers: [UnsafeCell<Box<[u8]>>; 3],
  /// Index of the most recently published buffer; exchanged atomically by
  /// both sides, never read-modify-written any other way.
  fresh: CachePadded<AtomicUsize>,
  /// Set by the writer after publishing, checked-and-cleared by the reader.
  has_new: CachePadded<AtomicBool>,
  len: usize,
}

// SAFETY: the writer only dereferences the buffer at its own index and the
// reader the one at its own index. Those two indices plus `fresh` remain a
// permutation of {0, 1, 2} because each side only ever swaps its own index
// with `fresh`, atomically, so no buffer is reachable from both sides at
// once. The AcqRel exchanges order each side's byte accesses against the
// other's.
unsafe impl Send for SlotShared {}
unsafe impl Sync for SlotShared {}

/// A tear-free, three-slot hand-off buffer for exactly one writer and one
/// reader.
///
/// The writer publishes a full buffer per call; the reader always gets the
/// latest complete publication, or the previous one again when nothing new
/// has landed. Neither side ever blocks on the other — the hand-off is a
/// pair of atomic index exchanges, not a lock.
///
/// Two buffers would let a finishing writer and a fetching reader collide
/// on the same slot. The third acts as the hand-off buffer, so reader and
/// writer never reference the same memory at the same time.
pub struct ResultSlot {
  shared: Arc<SlotShared>,
}

impl ResultSlot {
  /// Creates a slot whose three buffers are `len` bytes each, zero-filled.
  pub fn new(len: usize) -> Self {
    let buffers = [
      UnsafeCell::new(vec![0u8; len].into_boxed_slice()),
      UnsafeCell::new(vec![0u8; len].into_boxed_slice()),
      UnsafeCell::new(vec![0u8; len].into_boxed_slice()),
    ];
    Self {
      shared: Arc::new(SlotShared {
        buffers,
        fresh: CachePadded::new(AtomicUsize::new(2)),
        has_new: CachePadded::new(AtomicBool::new(false)),
        len,
      }),
    }
  }

  /// Splits the slot into its writer and reader halves.
  ///
  /// Neither half is `Clone`: single-writer/single-reader is enforced by
  /// ownership rather than a runtime lock.
  pub fn split(self) -> (SlotWriter, SlotReader) {
    (
      SlotWriter {
        shared: self.shared.clone(),
        own: 0,
      },
      SlotReader {
        shared: self.shared,
        own: 1,
      },
    )
  }
}

impl fmt::Debug for ResultSlot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResultSlot")
      .field("len", &self.shared.len)
      .finish_non_exhaustive()
  }
}

/// The writing half of a [`ResultSlot`].
pub struct SlotWriter {
  shared: Arc<SlotShared>,
  /// Index of the buffer this side currently owns.
  own: usize,
}

impl SlotWriter {
  /// Fills the writer-owned buffer via `fill`, then publishes it.
  ///
  /// The previously fresh buffer becomes the writer's next scratch buffer,
  /// ready to be overwritten on the next call.
  pub fn write<F>(&mut self, fill: F)
  where
    F: FnOnce(&mut [u8]),
  {
    // SAFETY: `own` is writer-owned until the exchange below; no other side
    // can reach this buffer (see SlotShared).
    let buf = unsafe { &mut *self.shared.buffers[self.own].get() };
    fill(buf);
    self.own = self.shared.fresh.swap(self.own, Ordering::AcqRel);
    self.shared.has_new.store(true, Ordering::Release);
  }

  /// Length in bytes of each buffer.
  pub fn len(&self) -> usize {
    self.shared.len
  }

  /// Returns `true` when the buffers are zero-length.
  pub fn is_empty(&self) -> bool {
    self.shared.len == 0
  }
}

impl fmt::Debug for SlotWriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SlotWriter")
      .field("len", &self.shared.len)
      .finish_non_exhaustive()
  }
}

/// The reading half of a [`ResultSlot`].
pub struct SlotReader {
  shared: Arc<SlotShared>,
  own: usize,
}

impl SlotReader {
  /// Returns the latest complete publication, or the previously returned
  /// buffer again when no write has landed since the last call.
  ///
  /// Never blocks, never errors, and never observes a partially written
  /// buffer. Idempotent staleness is the documented fallback: two reads
  /// with no intervening write yield the same bytes.
  pub fn read(&mut self) -> &[u8] {
    if self.shared.has_new.swap(false, Ordering::AcqRel) {
      self.own = self.shared.fresh.swap(self.own, Ordering::AcqRel);
    }
    // SAFETY: `own` is reader-owned until the next exchange; the writer
    // cannot reach this buffer (see SlotShared).
    unsafe { &*self.shared.buffers[self.own].get() }
  }

  /// Length in bytes of each buffer.
  pub fn len(&self) -> usize {
    self.shared.len
  }

  /// Returns `true` when the buffers are zero-length.
  pub fn is_empty(&self) -> bool {
    self.shared.len == 0
  }
}

impl fmt::Debug for SlotReader {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SlotReader")
      .field("len", &self.shared.len)
      .finish_non_exhaustive()
  }
}
