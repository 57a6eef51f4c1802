//! Compressed pointers: a shift-scaled offset encoding so a heap-object reference fits in a
//! narrow integer field.
//!
//! This is the feature that justifies a custom allocator at all for the runtime embedding this
//! crate: ordinary pointers on the target are too wide to pack into the object headers the
//! interpreter wants, but every live object lives inside one statically known region, so an
//! `(address - region_base) >> ALIGNMENT_LOG` encoding suffices.

use crate::config::ALIGNMENT_LOG;
use crate::error::HeapError;

/// Reserved compressed-pointer value meaning "no object".
///
/// Zero is safe to reserve because `region_base` itself (which would compress to zero) is never
/// a legal pointee: it is the heap's sentinel/base address, not the start of any real allocation.
pub const CP_NULL: u32 = 0;

/// A heap-object reference compressed into the low bits of a `u32`.
///
/// Never equal to [`CP_NULL`] for a value produced by [`compress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressedPtr(u32);

impl CompressedPtr {
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == CP_NULL
    }
}

/// Compress an in-region, `ALIGNMENT`-aligned pointer into a [`CompressedPtr`].
///
/// # Safety
/// - `p` must be non-null and point inside the region backing `region_base`.
/// - `p` must be aligned to the allocator's `ALIGNMENT`.
///
/// # Panics
/// Panics (via `debug_assert!`) in debug builds if `p` is null, misaligned, or the resulting
/// code would collide with [`CP_NULL`] or overflow the configured offset width.
#[must_use]
pub unsafe fn compress(p: *mut u8, region_base: *mut u8, offset_bits: u32) -> CompressedPtr {
    debug_assert!(
        !p.is_null(),
        "{}",
        HeapError::InvalidArgument("cannot compress a null pointer")
    );

    let delta = (p as usize).wrapping_sub(region_base as usize);
    debug_assert_eq!(
        delta % (1usize << ALIGNMENT_LOG),
        0,
        "{}",
        HeapError::InvalidArgument("pointer is not ALIGNMENT-aligned")
    );

    let code = (delta >> ALIGNMENT_LOG) as u32;
    debug_assert!(
        offset_bits >= 32 || code < (1u32 << offset_bits),
        "{}",
        HeapError::LogicError("compressed pointer does not fit in the configured offset width")
    );
    debug_assert_ne!(
        code,
        CP_NULL,
        "{}",
        HeapError::LogicError("compressed pointer collided with CP_NULL")
    );

    CompressedPtr(code)
}

/// Decompress a [`CompressedPtr`] back into an in-region pointer.
///
/// # Safety
/// The caller must ensure `cp` was produced by [`compress`] against the same `region_base`.
///
/// # Panics
/// Panics (via `debug_assert!`) in debug builds if `cp` is [`CP_NULL`].
#[must_use]
pub unsafe fn decompress(cp: CompressedPtr, region_base: *mut u8) -> *mut u8 {
    debug_assert_ne!(
        cp.0,
        CP_NULL,
        "{}",
        HeapError::InvalidArgument("cannot decompress CP_NULL")
    );
    let addr = (region_base as usize).wrapping_add((cp.0 as usize) << ALIGNMENT_LOG);
    addr as *mut u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ALIGNMENT, HEAP_OFFSET_LOG};

    #[test]
    fn round_trips_for_every_aligned_offset() {
        let mut area = [0u8; 4096];
        let base = area.as_mut_ptr();
        for i in (0..area.len()).step_by(ALIGNMENT) {
            if i == 0 {
                continue; // would compress to CP_NULL
            }
            let p = unsafe { base.add(i) };
            let cp = unsafe { compress(p, base, HEAP_OFFSET_LOG) };
            assert_ne!(cp.raw(), CP_NULL);
            let back = unsafe { decompress(cp, base) };
            assert_eq!(back, p);
        }
    }

    #[test]
    fn distinct_pointers_get_distinct_codes() {
        let mut area = [0u8; 4096];
        let base = area.as_mut_ptr();
        let a = unsafe { compress(base.add(ALIGNMENT), base, HEAP_OFFSET_LOG) };
        let b = unsafe { compress(base.add(ALIGNMENT * 2), base, HEAP_OFFSET_LOG) };
        assert_ne!(a, b);
    }
}
