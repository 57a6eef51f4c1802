//! Compile-time configuration constants.
//!
//! Every value here is fixed at build time. There is no runtime configuration, no environment
//! variable lookup, and no persisted state — matching the embedded target this crate serves.

/// Byte alignment of every payload this allocator hands out, and of every free-list node.
///
/// Must be a power of two and at least `size_of::<FreeNode>()` so a free node always fits inside
/// the smallest possible allocation.
pub const ALIGNMENT: usize = 8;

/// `log2(ALIGNMENT)`, used to turn multiplications/divisions by `ALIGNMENT` into shifts.
pub const ALIGNMENT_LOG: u32 = ALIGNMENT.trailing_zeros();

/// Number of bits an in-region offset is guaranteed to fit in.
///
/// Chosen so that `2^HEAP_OFFSET_LOG >= HEAP_SIZE` for the default global heap; callers
/// instantiating [`crate::Heap`] with a larger `const N` should widen this accordingly (it only
/// governs the debug assertions in [`crate::compressed`], not the wire format, which is a plain
/// `u32`).
pub const HEAP_OFFSET_LOG: u32 = 32;

/// Default backing-region size for the [`crate::global`] singleton.
pub const HEAP_SIZE: usize = 64 * 1024 * 1024;

/// Increment by which the soft allocation [`limit`](crate::heap::Heap) grows and shrinks.
///
/// Picked small relative to `HEAP_SIZE` so the pressure loop (see [`crate::pressure`]) triggers
/// well before the region is actually exhausted, giving the external reclaimer room to act.
pub const DESIRED_LIMIT: usize = 64 * 1024;
