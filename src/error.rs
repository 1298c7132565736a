use thiserror::Error;

/// Errors surfaced by the offload core.
///
/// Configuration and misuse errors are returned synchronously to the calling
/// thread. Task-body panics never appear here; they are caught at the worker
/// loop and are only observable through logging.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OffloadError {
  #[error("block size must be non-zero")]
  ZeroBlockSize,

  #[error("alignment {0} is not a power of two")]
  AlignmentNotPowerOfTwo(usize),

  #[error("alignment {got} is below the platform natural alignment {min}")]
  AlignmentTooSmall { got: usize, min: usize },

  #[error("block size {size} is not a multiple of alignment {alignment}")]
  MisalignedBlockSize { size: usize, alignment: usize },

  #[error("block size {0} exceeds the maximum supported allocation size")]
  OversizedBlock(usize),

  #[error("max idle blocks must be non-zero")]
  ZeroMaxIdle,

  #[error("queue is stopping or stopped, cannot accept new tasks")]
  QueueStopped,
}
