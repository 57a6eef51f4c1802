//! A process-wide heap singleton, for callers that want classic C-runtime-style free functions
//! instead of owning a [`crate::Heap`] value themselves.
//!
//! Sized by [`crate::config::HEAP_SIZE`] (64 MiB by default) and backed by a fixed-capacity
//! reclaim registry of 8 callbacks. Every function here is a thin forward to the same-named
//! method on the singleton [`Heap`], after an idempotent [`ensure_init`].

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::compressed::CompressedPtr;
use crate::config::HEAP_SIZE;
use crate::error::HeapError;
use crate::heap::Heap;
use crate::pressure::ReclaimFn;

const RECLAIMER_CAPACITY: usize = 8;

/// Wraps the singleton in `UnsafeCell` so it can live in a `static`; `Sync` is asserted here, not
/// derived, because the crate's single-threaded-by-construction contract (see the crate-level
/// docs) is what actually rules out concurrent access, not anything this type enforces itself.
struct HeapCell(UnsafeCell<Heap<HEAP_SIZE, RECLAIMER_CAPACITY>>);

unsafe impl Sync for HeapCell {}

static HEAP: HeapCell = HeapCell(UnsafeCell::new(Heap::new()));
static DID_INIT: AtomicBool = AtomicBool::new(false);

#[inline]
fn heap_mut() -> &'static mut Heap<HEAP_SIZE, RECLAIMER_CAPACITY> {
    unsafe { &mut *HEAP.0.get() }
}

/// Initialize the singleton. Idempotent across a program's lifetime; subsequent calls are no-ops.
pub fn ensure_init() {
    if !DID_INIT.load(Ordering::Acquire) {
        heap_mut().init();
        DID_INIT.store(true, Ordering::Release);
        log::debug!("global heap singleton initialized");
    }
}

/// Explicit alias for [`ensure_init`], matching the External Interfaces table's `init` entry.
pub fn init() {
    ensure_init();
}

/// Forwards to [`Heap::finalize`].
pub fn finalize() {
    ensure_init();
    heap_mut().finalize();
}

/// Forwards to [`Heap::try_finalize`].
pub fn try_finalize() -> Result<(), HeapError> {
    ensure_init();
    heap_mut().try_finalize()
}

/// Forwards to [`Heap::alloc_or_fatal`].
pub fn alloc_or_fatal(size: usize) -> *mut u8 {
    ensure_init();
    heap_mut().alloc_or_fatal(size)
}

/// Forwards to [`Heap::alloc_or_null`].
pub fn alloc_or_null(size: usize) -> Option<*mut u8> {
    ensure_init();
    heap_mut().alloc_or_null(size)
}

/// Forwards to [`Heap::alloc_store_size`].
pub fn alloc_store_size(size: usize) -> Option<*mut u8> {
    ensure_init();
    heap_mut().alloc_store_size(size)
}

/// Forwards to [`Heap::free`].
///
/// # Safety
/// See [`Heap::free`].
pub unsafe fn free(p: *mut u8, size: usize) {
    ensure_init();
    unsafe {
        heap_mut().free(p, size);
    }
}

/// Forwards to [`Heap::free_stored`].
///
/// # Safety
/// See [`Heap::free_stored`].
pub unsafe fn free_stored(p: *mut u8) {
    ensure_init();
    unsafe {
        heap_mut().free_stored(p);
    }
}

/// Forwards to [`Heap::compress`].
///
/// # Safety
/// See [`Heap::compress`].
pub unsafe fn compress(p: *mut u8) -> CompressedPtr {
    ensure_init();
    unsafe { heap_mut().compress(p) }
}

/// Forwards to [`Heap::decompress`].
///
/// # Safety
/// See [`Heap::decompress`].
pub unsafe fn decompress(cp: CompressedPtr) -> *mut u8 {
    ensure_init();
    unsafe { heap_mut().decompress(cp) }
}

/// Forwards to [`Heap::is_heap_pointer`].
pub fn is_heap_pointer(p: *mut u8) -> bool {
    ensure_init();
    heap_mut().is_heap_pointer(p)
}

/// Forwards to [`Heap::register_reclaimer`].
pub fn register_reclaimer(f: ReclaimFn) -> Result<(), HeapError> {
    ensure_init();
    heap_mut().register_reclaimer(f)
}

#[cfg(feature = "stats")]
pub fn stats() -> crate::stats::Counters {
    ensure_init();
    *heap_mut().stats()
}

#[cfg(feature = "stats")]
pub fn reset_peak() {
    ensure_init();
    heap_mut().reset_peak();
}

#[cfg(feature = "stats")]
pub fn print_stats() {
    ensure_init();
    heap_mut().print_stats();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The singleton has no lock of its own (single-threaded by design); serialize the tests that
    // touch it so the test harness's default multi-threaded runner doesn't race on it.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn singleton_allocates_and_frees() {
        let _guard = TEST_LOCK.lock().unwrap();
        ensure_init();
        let p = alloc_or_null(64).expect("global heap has room");
        unsafe {
            free(p, 64);
        }
    }

    #[test]
    fn init_is_idempotent() {
        let _guard = TEST_LOCK.lock().unwrap();
        init();
        init();
        assert!(DID_INIT.load(Ordering::Acquire));
    }
}
