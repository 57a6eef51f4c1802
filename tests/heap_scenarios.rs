//! End-to-end scenarios exercising the allocator, deallocator, pressure loop, and compressed
//! pointers together, instead of the module-local unit tests each piece carries.

use std::cell::Cell;
use std::collections::HashSet;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use rt_heap::{Heap, Severity, ALIGNMENT, DESIRED_LIMIT};

#[test]
fn s1_empty_heap_alloc_then_free() {
    let mut heap: Heap<4096> = Heap::new();
    heap.init();

    let p1 = heap.alloc_or_null(8).expect("heap starts empty, alloc must succeed");
    assert_eq!(heap.allocated_size(), 8);

    unsafe {
        heap.free(p1, 8);
    }
    assert_eq!(heap.allocated_size(), 0);
    heap.finalize();
}

#[test]
fn s2_coalesce_with_prev_and_next() {
    let mut heap: Heap<256> = Heap::new();
    heap.init();

    let a = heap.alloc_or_null(16).unwrap();
    let b = heap.alloc_or_null(16).unwrap();
    let c = heap.alloc_or_null(16).unwrap();

    unsafe {
        heap.free(b, 16); // isolated free region between two live blocks
        heap.free(a, 16); // merges with the freed `b` region
        heap.free(c, 16); // merges the remaining tail back in
    }

    assert_eq!(heap.allocated_size(), 0);
    // The whole area must have reunited into one region: a request for the full capacity
    // succeeds, which would be impossible if a, b, c's regions were still fragmented.
    let everything = heap.alloc_or_null(256).expect("area should be one contiguous region");
    unsafe {
        heap.free(everything, 256);
    }
}

#[test]
fn s3_fragmentation_then_first_fit_takes_the_lowest_address() {
    let mut heap: Heap<1024> = Heap::new();
    heap.init();

    let blocks: Vec<*mut u8> = (0..10).map(|_| heap.alloc_or_null(16).unwrap()).collect();

    // Free the even-indexed blocks, leaving 5 isolated 16-byte free regions interleaved with 5
    // live blocks.
    for &p in blocks.iter().step_by(2) {
        unsafe {
            heap.free(p, 16);
        }
    }

    let reused = heap.alloc_or_null(16).expect("a free region of the right size exists");
    assert_eq!(reused, blocks[0], "first-fit must take the lowest-address free region");

    unsafe {
        heap.free(reused, 16);
        for &p in blocks.iter().skip(1).step_by(2) {
            heap.free(p, 16);
        }
    }
}

// S4 needs its reclaim callback to reach back into the `Heap` under test, but the registry's
// callback type is a bare `fn(Severity)` with no captured state (see `crate::pressure`) — this
// mirrors the original's global-singleton design. A static pointer, valid only for the duration
// of this single-threaded test, stands in for that global.
static S4_HEAP: AtomicPtr<Heap<{ DESIRED_LIMIT * 2 }>> = AtomicPtr::new(ptr::null_mut());
thread_local! {
    static S4_PENDING: Cell<Option<(*mut u8, usize)>> = const { Cell::new(None) };
    static S4_LOW_CALLS: Cell<u32> = const { Cell::new(0) };
    static S4_HIGH_CALLS: Cell<u32> = const { Cell::new(0) };
}

fn s4_reclaim(severity: Severity) {
    match severity {
        Severity::Low => S4_LOW_CALLS.with(|c| c.set(c.get() + 1)),
        Severity::High => S4_HIGH_CALLS.with(|c| c.set(c.get() + 1)),
    }
    if severity != Severity::High {
        return;
    }
    if let Some((p, size)) = S4_PENDING.with(Cell::take) {
        let heap_ptr = S4_HEAP.load(Ordering::Acquire);
        if !heap_ptr.is_null() {
            unsafe {
                (*heap_ptr).free(p, size);
            }
        }
    }
}

#[test]
fn s4_pressure_loop_triggers_reclamation() {
    const CAP: usize = DESIRED_LIMIT * 2;
    let mut heap: Heap<CAP> = Heap::new();
    heap.init();
    S4_HEAP.store(&mut heap, Ordering::Release);
    heap.register_reclaimer(s4_reclaim).unwrap();

    let initial_limit = heap.limit();
    assert_eq!(initial_limit, DESIRED_LIMIT);

    // Exactly DESIRED_LIMIT bytes forces one limit-growth step; the remaining filler leaves a
    // small tail free, too small to satisfy the final request on its own.
    let staged = heap.alloc_or_null(DESIRED_LIMIT).expect("first half fits");
    let filler = heap
        .alloc_or_null(DESIRED_LIMIT - 4096)
        .expect("second allocation fits in what remains");
    assert!(heap.limit() > initial_limit, "limit should have advanced");

    S4_PENDING.with(|c| c.set(Some((staged, DESIRED_LIMIT))));

    let p = heap
        .alloc_or_null(8192)
        .expect("pressure loop should reclaim the staged block and succeed");
    assert!(heap.is_heap_pointer(p));

    S4_LOW_CALLS.with(|c| assert!(c.get() >= 1, "Low should have run at least once"));
    S4_HIGH_CALLS.with(|c| assert_eq!(c.get(), 1, "High should have run exactly once"));

    unsafe {
        heap.free(filler, DESIRED_LIMIT - 4096);
        heap.free(p, 8192);
    }
    heap.finalize();
    S4_HEAP.store(ptr::null_mut(), Ordering::Release);
}

#[test]
#[should_panic(expected = "OUT_OF_MEMORY")]
fn s5_oom_fatality_with_no_registered_reclaimer() {
    let mut heap: Heap<128> = Heap::new();
    heap.init();

    // Drain the heap with fast-path (ALIGNMENT-sized) allocations, then ask for more than is
    // left. With no reclaimer registered, every severity in the pressure loop is a no-op.
    while heap.alloc_or_null(ALIGNMENT).is_some() {}
    heap.alloc_or_fatal(ALIGNMENT);
}

#[test]
fn s6_compression_round_trips_and_stays_unique_across_alloc_free_churn() {
    let mut heap: Heap<8192> = Heap::new();
    heap.init();

    // A small deterministic LCG in place of an external rand dependency.
    let mut seed: u32 = 0x2545_F491;
    let mut next = || {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
        seed
    };

    let mut live: Vec<*mut u8> = Vec::new();
    let mut seen_codes: HashSet<u32> = HashSet::new();

    for _ in 0..500 {
        if !live.is_empty() && next() % 2 == 0 {
            let idx = (next() as usize) % live.len();
            let p = live.swap_remove(idx);
            let cp = unsafe { heap.compress(p) };
            seen_codes.remove(&cp.raw());
            unsafe {
                heap.free(p, ALIGNMENT);
            }
        } else if let Some(p) = heap.alloc_or_null(ALIGNMENT) {
            let cp = unsafe { heap.compress(p) };
            assert!(!cp.is_null());
            assert!(
                seen_codes.insert(cp.raw()),
                "two distinct live pointers must not share a compressed code"
            );
            assert_eq!(unsafe { heap.decompress(cp) }, p);
            live.push(p);
        }
    }

    for p in live {
        unsafe {
            heap.free(p, ALIGNMENT);
        }
    }
    heap.finalize();
}
