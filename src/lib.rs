//! # Fixed-Capacity Heap Allocator with Compressed Pointers
//!
//! A general-purpose heap allocator for embedding in a lightweight language runtime on
//! resource-constrained devices. It carves a single, statically sized byte region into aligned
//! blocks that callers request and release at arbitrary sizes, and exposes a **compressed
//! pointer** encoding so references to heap objects fit in a `u32` instead of a native pointer —
//! the feature that justifies a purpose-built allocator over a general-purpose one.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                         Heap<N, R>                         │
//! │   alloc_or_fatal / alloc_or_null / alloc_store_size         │
//! │   free / free_stored                                        │
//! └───────────────┬───────────────────────────────┬─────────────┘
//!                 │                               │
//! ┌───────────────▼───────────────┐   ┌───────────▼───────────────┐
//! │          free_list             │   │         pressure           │
//! │  sentinel-rooted singly linked │   │  Registry<R> of fn(Severity)│
//! │  list, skip-hint accelerated   │   │  Low → High escalation     │
//! │  coalescing                    │   │                            │
//! └───────────────┬───────────────┘   └────────────────────────────┘
//!                 │
//! ┌───────────────▼───────────────┐   ┌────────────────────────────┐
//! │            region              │   │         compressed          │
//! │  HeapArea<N>, FreeNode header  │   │  (addr - base) >> ALIGN_LOG  │
//! └───────────────┬───────────────┘   └────────────────────────────┘
//!                 │
//! ┌───────────────▼───────────────┐
//! │             offset             │
//! │  bijection: address <-> u32    │
//! └────────────────────────────────┘
//! ```
//!
//! ## Core components
//!
//! * **[`Heap<N, R>`]** — the allocator itself: fast path for minimum-alignment requests,
//!   first-fit slow path otherwise, the pressure-escalation retry loop, and the
//!   `alloc_store_size`/`free_stored` convenience pair.
//! * The free list, offset codec, and free-node header are internal (`free_list`, `offset`,
//!   `region`) — the address-ordered structure the allocator and deallocator share.
//! * **[`compressed`]** — `compress`/`decompress` between in-region pointers and [`CompressedPtr`].
//! * **[`pressure`]** — the reclamation-callback registry and [`Severity`] levels.
//! * **[`global`]** — a classic process-wide singleton wrapper around a default-sized [`Heap`],
//!   for callers that want C-runtime-style free functions instead of an owned instance.
//! * **[`stats`]** (Cargo feature `stats`) — allocation/free counters, skip-ratio and iteration
//!   statistics, reported through the `log` facade.
//! * **[`error`]** — [`HeapError`], the typed vocabulary for the ambient fallible entry points.
//!
//! ## Usage
//!
//! ```rust
//! use rt_heap::Heap;
//!
//! let mut heap: Heap<65536> = Heap::new();
//! heap.init();
//!
//! let p = heap.alloc_or_null(64).expect("heap has room");
//! unsafe {
//!     heap.free(p, 64);
//! }
//!
//! heap.finalize();
//! ```
//!
//! ## Safety model
//!
//! This crate is **single-threaded by construction**: every mutating operation takes `&mut
//! self`, there are no locks and no atomics for mutual exclusion, and the only permitted
//! reentrancy is a registered reclamation callback calling [`Heap::free`] (never `alloc*`) back
//! into the heap that invoked it. The free-node header is overlaid directly onto free bytes of
//! the backing region via `unsafe` raw-pointer reads and writes; every such call documents its
//! `# Safety` preconditions at the call site.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod compressed;
pub mod error;
pub mod global;
pub mod pressure;
#[cfg(feature = "stats")]
pub mod stats;

mod config;
mod free_list;
mod heap;
mod offset;
mod region;

pub use compressed::CompressedPtr;
pub use config::{ALIGNMENT, ALIGNMENT_LOG, DESIRED_LIMIT, HEAP_OFFSET_LOG, HEAP_SIZE};
pub use error::HeapError;
pub use heap::Heap;
pub use pressure::Severity;

const _: () = assert!(
    1usize << config::ALIGNMENT_LOG == config::ALIGNMENT,
    "ALIGNMENT_LOG must match ALIGNMENT"
);
const _: () = assert!(
    core::mem::align_of::<region::HeapArea<1>>() == config::ALIGNMENT,
    "HeapArea's repr(align) must match config::ALIGNMENT"
);
