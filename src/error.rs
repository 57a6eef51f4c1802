//! Error types returned by the fallible corners of this crate's API.
//!
//! Most of the allocator's surface is infallible by construction (`alloc_or_fatal` panics,
//! `alloc_or_null` returns `Option`) — [`HeapError`] exists for the handful of operations that can
//! fail for reasons the caller should be able to match on, mirroring the `thiserror`-based error
//! enums used elsewhere in this workspace.

use thiserror::Error;

/// Errors produced by [`crate::Heap`] and [`crate::global`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeapError {
    /// The heap could not satisfy a request even after exhausting the pressure-escalation
    /// protocol.
    #[error("heap exhausted: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    /// A caller-supplied argument violates a precondition (zero-size request, misaligned pointer,
    /// pointer outside the managed region).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An internal consistency check failed — a free-list invariant was violated, almost always
    /// indicating a prior double-free or out-of-bounds write by the caller.
    #[error("heap logic error: {0}")]
    LogicError(&'static str),

    /// [`crate::Heap::try_finalize`] was called while allocations were still outstanding.
    #[error("{bytes} byte(s) still allocated at finalize time")]
    LeakedAllocations { bytes: usize },

    /// The reclaim-callback registry was already at capacity.
    #[error("reclaim callback registry is full")]
    RegistryFull,
}
