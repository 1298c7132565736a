//! A thread-based offload core for real-time frame pipelines: a bounded,
//! cancellable task queue with one dedicated worker, a self-returning
//! fixed-size buffer pool, and a tear-free three-slot result buffer.
//!
//! Together the three move bytes from a render thread to a background
//! worker and the worker's output back, without the render thread ever
//! blocking on the worker and without unbounded backlog: stale tasks are
//! cancelled from the front of the queue, buffers recycle through the pool,
//! and the reader always sees the latest complete result.

mod error;
mod pool;
mod queue;
mod slot;
mod token;

pub use error::OffloadError;
pub use pool::{Block, BufferPool};
pub use queue::{TaskBody, TaskQueue};
pub use slot::{ResultSlot, SlotReader, SlotWriter};
pub use token::CancellationToken;
