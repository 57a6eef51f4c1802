//! The allocator proper: wires the free list, offset codec, compressed-pointer API, pressure
//! loop, and optional counters onto one statically sized backing region.

use core::mem::size_of;
use core::ptr;

use crate::compressed::{self, CompressedPtr};
use crate::config::{ALIGNMENT, DESIRED_LIMIT, HEAP_OFFSET_LOG};
use crate::error::HeapError;
use crate::free_list::{FreeList, required_size};
use crate::pressure::{ReclaimFn, Registry, Severity};
use crate::region::{HeapArea, HEADER_SIZE};
#[cfg(feature = "stats")]
use crate::stats::Counters;

/// A fixed-capacity, single-threaded heap: `N` bytes of backing storage, up to `R` registered
/// reclamation callbacks.
///
/// `R` defaults to 4, matching the handful of severity-driven reclaimers a typical embedding
/// (one GC pass, one cache-eviction pass, ...) registers; instantiate with an explicit `R` for
/// more.
pub struct Heap<const N: usize, const R: usize = 4> {
    area: HeapArea<N>,
    free_list: FreeList,
    allocated_size: usize,
    limit: usize,
    initialized: bool,
    /// Set for the duration of [`Self::alloc_with_pressure`]; catches a reclaim callback that
    /// violates its contract by calling back into `alloc*` instead of only `free`.
    allocating: bool,
    reclaimer: Registry<R>,
    #[cfg(feature = "stats")]
    stats: Counters,
}

impl<const N: usize, const R: usize> Default for Heap<N, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, const R: usize> Heap<N, R> {
    /// An uninitialized heap. Call [`Self::init`] before allocating anything.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            area: HeapArea::zeroed(),
            free_list: FreeList::new(),
            allocated_size: 0,
            limit: 0,
            initialized: false,
            allocating: false,
            reclaimer: Registry::new(),
            #[cfg(feature = "stats")]
            stats: Counters::new(N),
        }
    }

    /// Carve the whole backing region into a single free block. Must be called exactly once
    /// before any allocation.
    pub fn init(&mut self) {
        debug_assert!(
            !self.initialized,
            "{}",
            HeapError::LogicError("heap initialized twice")
        );
        let base = self.area.base_ptr();
        unsafe {
            self.free_list.init(base, N);
        }
        self.allocated_size = 0;
        self.limit = DESIRED_LIMIT;
        self.initialized = true;
        log::debug!("heap initialized: {N} bytes, limit {DESIRED_LIMIT}");
    }

    fn require_init(&self) {
        debug_assert!(
            self.initialized,
            "{}",
            HeapError::LogicError("heap used before init")
        );
    }

    /// The reference point [`compressed::compress`]/[`compressed::decompress`] measure offsets
    /// from: one header's worth of bytes *before* `area`'s first byte, mirroring the original's
    /// `heap_start = &jmem_heap` (the struct address, which precedes its `area` field by
    /// `sizeof(jmem_heap_free_t)`). Using `area`'s own base as the reference point instead would
    /// make the heap's very first allocatable address compress to `CP_NULL`, since that address
    /// would then have zero offset from the reference point; offsetting by `HEADER_SIZE` keeps
    /// the reference point itself outside the region and therefore never a legal pointee.
    #[inline]
    fn compress_base(&self) -> *mut u8 {
        ((self.free_list.base() as usize) - HEADER_SIZE) as *mut u8
    }

    /// Assert no allocations remain outstanding. Debug builds only; see [`Self::try_finalize`]
    /// for a fallible variant.
    pub fn finalize(&mut self) {
        self.try_finalize()
            .expect("heap finalized with outstanding allocations");
    }

    /// Fallible finalize: returns [`HeapError::LeakedAllocations`] instead of asserting.
    pub fn try_finalize(&mut self) -> Result<(), HeapError> {
        self.require_init();
        if self.allocated_size != 0 {
            log::error!(
                "finalize with {} byte(s) still allocated",
                self.allocated_size
            );
            return Err(HeapError::LeakedAllocations {
                bytes: self.allocated_size,
            });
        }
        self.initialized = false;
        Ok(())
    }

    /// Bytes currently handed out to callers.
    #[must_use]
    pub const fn allocated_size(&self) -> usize {
        self.allocated_size
    }

    /// Current soft pressure threshold.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Register a reclamation callback invoked by the pressure loop. See [`crate::pressure`].
    pub fn register_reclaimer(&mut self, f: ReclaimFn) -> Result<(), HeapError> {
        if self.reclaimer.register(f) {
            Ok(())
        } else {
            Err(HeapError::RegistryFull)
        }
    }

    /// Try the fast path (exact `ALIGNMENT`-sized requests) or the first-fit slow path, without
    /// consulting the pressure loop. `size == 0` yields `None` by convention, not an error.
    fn alloc_internal(&mut self, size: usize) -> Option<*mut u8> {
        if size == 0 {
            return None;
        }
        let required = required_size(size);

        let (found, _visited) = if required == ALIGNMENT as u32 {
            (self.free_list.take_first(), 1)
        } else {
            self.free_list.first_fit(required)
        };

        #[cfg(feature = "stats")]
        self.stats.on_alloc_iter(_visited);

        if found.is_some() {
            self.allocated_size += required as usize;
            while self.allocated_size >= self.limit {
                self.limit += DESIRED_LIMIT;
            }
            #[cfg(feature = "stats")]
            self.stats.on_alloc(size, required as usize);
        }

        found
    }

    /// Drive the pressure-escalation protocol (§4.F): a pre-emptive `Low` call when the request
    /// would cross `limit`, then an escalating `Low` → `High` retry loop on allocation failure.
    ///
    /// Guards against a reclaim callback re-entering `alloc*` on this heap — the callback
    /// contract permits it to call only `free`.
    fn alloc_with_pressure(&mut self, size: usize) -> Option<*mut u8> {
        debug_assert!(
            !self.allocating,
            "{}",
            HeapError::LogicError("reclaim callback re-entered alloc")
        );
        self.allocating = true;
        let result = self.alloc_with_pressure_inner(size);
        self.allocating = false;
        result
    }

    fn alloc_with_pressure_inner(&mut self, size: usize) -> Option<*mut u8> {
        #[cfg(feature = "gc-before-each-alloc")]
        self.reclaimer.run(Severity::High);

        // Pre-emptive check against the raw requested size, not the ALIGNMENT-rounded size,
        // matching the original allocator's `jmem_heap_allocated_size + size >= limit` test.
        if self.allocated_size + size >= self.limit {
            self.reclaimer.run(Severity::Low);
        }

        if let Some(p) = self.alloc_internal(size) {
            return Some(p);
        }

        for severity in [Severity::Low, Severity::High] {
            self.reclaimer.run(severity);
            if let Some(p) = self.alloc_internal(size) {
                return Some(p);
            }
        }

        log::warn!("allocation of {size} byte(s) failed after full pressure escalation");
        None
    }

    /// Allocate `size` bytes, aligned to [`ALIGNMENT`]. Returns `None` for `size == 0` and on
    /// exhaustion (after the full pressure loop has run).
    pub fn alloc_or_null(&mut self, size: usize) -> Option<*mut u8> {
        self.require_init();
        if size == 0 {
            return None;
        }
        self.alloc_with_pressure(size)
    }

    /// Like [`Self::alloc_or_null`], but terminates the process on exhaustion instead of
    /// returning `None`.
    ///
    /// # Panics
    /// Panics with an `OUT_OF_MEMORY` message if the heap cannot satisfy the request even after
    /// the full pressure-escalation protocol runs.
    pub fn alloc_or_fatal(&mut self, size: usize) -> *mut u8 {
        match self.alloc_or_null(size) {
            Some(p) => p,
            None => {
                let err = HeapError::OutOfMemory {
                    requested: size,
                    available: self.free_list.area_size() - self.allocated_size,
                };
                log::error!("OUT_OF_MEMORY: {err}");
                panic!("OUT_OF_MEMORY: {err}");
            }
        }
    }

    /// Allocate `size` bytes preceded by a 4-byte header recording that size, returning the
    /// address just past the header. Pairs with [`Self::free_stored`]. Only 4-byte aligned, not
    /// [`ALIGNMENT`]-aligned.
    pub fn alloc_store_size(&mut self, size: usize) -> Option<*mut u8> {
        self.require_init();
        if size == 0 {
            return None;
        }
        const HEADER: usize = size_of::<u32>();
        let total = HEADER + size;
        let block = self.alloc_with_pressure(total)?;
        unsafe {
            ptr::write(block.cast::<u32>(), size as u32);
            Some(block.add(HEADER))
        }
    }

    /// Release a block previously returned by [`Self::alloc_or_null`] or
    /// [`Self::alloc_or_fatal`]. `size` must match the value originally requested.
    ///
    /// # Safety
    /// `p` must currently be allocated from this heap with exactly `size` bytes requested;
    /// double-free and mismatched sizes are undefined behavior.
    pub unsafe fn free(&mut self, p: *mut u8, size: usize) {
        self.require_init();
        debug_assert!(
            size > 0,
            "{}",
            HeapError::InvalidArgument("free called with size 0")
        );
        debug_assert!(
            self.free_list.contains(p),
            "{}",
            HeapError::InvalidArgument("freed pointer does not belong to this heap")
        );

        let aligned = required_size(size);
        let (used_hint, _visited) = unsafe { self.free_list.insert(p, aligned) };

        self.allocated_size -= aligned as usize;
        while self.limit > DESIRED_LIMIT && self.limit - DESIRED_LIMIT >= self.allocated_size {
            self.limit -= DESIRED_LIMIT;
        }

        #[cfg(feature = "stats")]
        {
            self.stats.on_free(size, aligned as usize);
            self.stats.on_free_iter(_visited);
            if used_hint {
                self.stats.on_skip();
            } else {
                self.stats.on_nonskip();
            }
        }
        let _ = used_hint;
    }

    /// Release a block previously returned by [`Self::alloc_store_size`], recovering its size
    /// from the header instead of requiring the caller to remember it.
    ///
    /// # Safety
    /// `p` must have been returned by [`Self::alloc_store_size`] on this heap and not yet freed.
    pub unsafe fn free_stored(&mut self, p: *mut u8) {
        const HEADER: usize = size_of::<u32>();
        let block = unsafe { p.sub(HEADER) };
        let size = unsafe { ptr::read(block.cast::<u32>()) } as usize;
        unsafe {
            self.free(block, HEADER + size);
        }
    }

    /// Compress an in-region pointer into a [`CompressedPtr`]. See [`crate::compressed`].
    ///
    /// # Safety
    /// `p` must be a live, [`ALIGNMENT`]-aligned pointer inside this heap's region.
    #[must_use]
    pub unsafe fn compress(&self, p: *mut u8) -> CompressedPtr {
        unsafe { compressed::compress(p, self.compress_base(), HEAP_OFFSET_LOG) }
    }

    /// Decompress a [`CompressedPtr`] produced by [`Self::compress`] on this same heap.
    ///
    /// # Safety
    /// `cp` must not be [`crate::compressed::CP_NULL`] and must have been produced by
    /// [`Self::compress`] on this heap.
    #[must_use]
    pub unsafe fn decompress(&self, cp: CompressedPtr) -> *mut u8 {
        unsafe { compressed::decompress(cp, self.compress_base()) }
    }

    /// Whether `p` lies inside this heap's managed region. Debug/diagnostic use; does not
    /// distinguish live allocations from free regions.
    #[must_use]
    pub fn is_heap_pointer(&self, p: *mut u8) -> bool {
        self.free_list.contains(p)
    }

    #[cfg(feature = "stats")]
    #[must_use]
    pub fn stats(&self) -> &Counters {
        &self.stats
    }

    #[cfg(feature = "stats")]
    pub fn reset_peak(&mut self) {
        self.stats.reset_peak();
    }

    #[cfg(feature = "stats")]
    pub fn print_stats(&self) {
        self.stats.report();
    }
}
