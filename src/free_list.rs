//! The singly linked, address-ordered free list.
//!
//! The list is rooted at a sentinel (`head`) that never lives inside the managed region, so the
//! "no free regions left" state is representable as a real node (`head.next_offset ==
//! END_OF_LIST`) rather than a null root pointer — this removes a branch from every walk's first
//! step. Real nodes are overlaid directly onto free bytes of the region; see [`crate::region`].

use core::ptr;

use crate::config::ALIGNMENT;
use crate::offset::{address, offset};
use crate::region::{FreeNode, END_OF_LIST, align_up};

/// A position in the free list: either the sentinel root or a real in-region node.
///
/// Kept distinct from a raw pointer so the sentinel never needs an address of its own — its
/// fields live directly in [`FreeList::head`], sidestepping any self-referential-pointer
/// concerns if the owning [`FreeList`] is ever relocated before [`FreeList::init`] runs.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cursor {
    Head,
    Node(*mut u8),
}

pub(crate) struct FreeList {
    /// Sentinel; `head.size` is unused, `head.next_offset` points at the first real free region.
    head: FreeNode,
    /// Base address of the managed region, used to resolve offsets to pointers.
    base: *mut u8,
    area_size: usize,
    /// Last `prev` visited by an allocation or free; accelerates the next free's insertion walk.
    skip_hint: Cursor,
}

// Safety: all access is mediated by `&mut self`; the crate enforces the single-writer invariant,
// it is not provided by this type itself.
unsafe impl Send for FreeList {}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self {
            head: FreeNode::new(0, END_OF_LIST),
            base: ptr::null_mut(),
            area_size: 0,
            skip_hint: Cursor::Head,
        }
    }

    /// Initialize the list to manage `[base, base + area_size)` as one free region.
    ///
    /// # Safety
    /// - `[base, base + area_size)` must be valid, writable, and exclusively owned by this list.
    /// - `base` must be aligned to [`ALIGNMENT`] and `area_size` must be at least
    ///   `size_of::<FreeNode>()`.
    pub(crate) unsafe fn init(&mut self, base: *mut u8, area_size: usize) {
        self.base = base;
        self.area_size = area_size;
        unsafe {
            FreeNode::write_at(base, FreeNode::new(area_size as u32, END_OF_LIST));
        }
        self.head = FreeNode::new(0, offset(Some(base), base));
        self.skip_hint = Cursor::Head;
    }

    #[inline]
    fn node_at(&self, p: *mut u8) -> FreeNode {
        debug_assert!(self.contains(p));
        unsafe { FreeNode::read_at(p) }
    }

    #[inline]
    fn write_node_at(&mut self, p: *mut u8, node: FreeNode) {
        debug_assert!(self.contains(p));
        unsafe {
            FreeNode::write_at(p, node);
        }
    }

    /// Pointer named by `cursor.next_offset`, or `None` for the list terminator.
    fn next_of(&self, cursor: Cursor) -> Option<*mut u8> {
        let next_offset = match cursor {
            Cursor::Head => self.head.next_offset,
            Cursor::Node(p) => self.node_at(p).next_offset,
        };
        address(next_offset, self.base)
    }

    /// Point `cursor`'s link at `target` (`None` encodes the list terminator).
    fn set_next(&mut self, cursor: Cursor, target: Option<*mut u8>) {
        let encoded = offset(target, self.base);
        match cursor {
            Cursor::Head => self.head.next_offset = encoded,
            Cursor::Node(p) => {
                let mut node = self.node_at(p);
                node.next_offset = encoded;
                self.write_node_at(p, node);
            }
        }
    }

    /// Whether `p` lies inside the managed region.
    pub(crate) fn contains(&self, p: *mut u8) -> bool {
        let start = self.base as usize;
        let end = start + self.area_size;
        let addr = p as usize;
        addr >= start && addr <= end
    }

    /// First free region, or `None` if the list is empty.
    pub(crate) fn first(&self) -> Option<*mut u8> {
        self.next_of(Cursor::Head)
    }

    /// Fast path: take the first free region when the caller wants exactly [`ALIGNMENT`] bytes.
    ///
    /// Returns `None` if the list is empty (the caller falls back to [`Self::first_fit`], which
    /// will also find nothing but keeps the two paths independent and simple).
    pub(crate) fn take_first(&mut self) -> Option<*mut u8> {
        let first = self.first()?;
        let node = self.node_at(first);
        debug_assert!(node.size >= ALIGNMENT as u32);

        if node.size == ALIGNMENT as u32 {
            self.set_next(Cursor::Head, address(node.next_offset, self.base));
        } else {
            let remaining_addr = unsafe { first.add(ALIGNMENT) };
            let remaining = FreeNode::new(node.size - ALIGNMENT as u32, node.next_offset);
            self.write_node_at(remaining_addr, remaining);
            self.set_next(Cursor::Head, Some(remaining_addr));
        }

        if self.skip_hint == Cursor::Node(first) {
            self.skip_hint = match self.first() {
                Some(p) => Cursor::Node(p),
                None => Cursor::Head,
            };
        }

        Some(first)
    }

    /// Walk the list from the head, taking the first region at least `required` bytes long.
    ///
    /// Larger-than-needed regions are carved from the front: the returned address is the
    /// candidate's current address, and the remainder becomes a new, smaller free node at
    /// `candidate + required`.
    ///
    /// Returns the candidate pointer alongside the number of nodes visited, so callers can feed
    /// [`crate::stats::Counters`] without this module needing to know stats exist.
    pub(crate) fn first_fit(&mut self, required: u32) -> (Option<*mut u8>, u32) {
        let mut prev = Cursor::Head;
        let mut current = self.next_of(prev);
        let mut visited = 0u32;

        while let Some(cur) = current {
            visited += 1;
            let node = self.node_at(cur);

            if node.size >= required {
                if node.size == required {
                    self.set_next(prev, address(node.next_offset, self.base));
                } else {
                    let remaining_addr = unsafe { cur.add(required as usize) };
                    let remaining = FreeNode::new(node.size - required, node.next_offset);
                    self.write_node_at(remaining_addr, remaining);
                    self.set_next(prev, Some(remaining_addr));
                }
                self.skip_hint = prev;
                return (Some(cur), visited);
            }

            prev = Cursor::Node(cur);
            current = self.next_of(prev);
        }

        (None, visited)
    }

    /// Insert a freed region of `aligned_size` bytes starting at `p` back into the list,
    /// coalescing with neighbours where adjacent.
    ///
    /// Returns whether the search started from the skip hint (as opposed to the head), and how
    /// many nodes the insertion walk visited, for [`crate::stats::Counters`].
    ///
    /// # Safety
    /// - `[p, p + aligned_size)` must currently be allocated and exclusively owned by the caller.
    /// - `p` must be aligned to [`ALIGNMENT`].
    pub(crate) unsafe fn insert(&mut self, p: *mut u8, aligned_size: u32) -> (bool, u32) {
        debug_assert!(self.contains(p));

        // Choose the search origin: the skip hint if it's strictly before `p`, else the head.
        let (origin, used_skip_hint) = match self.skip_hint {
            Cursor::Head => (Cursor::Head, false),
            Cursor::Node(hint) if (hint as usize) < (p as usize) => (Cursor::Node(hint), true),
            Cursor::Node(_) => (Cursor::Head, false),
        };

        let mut prev = origin;
        let mut next = self.next_of(prev);
        let mut visited = 0u32;
        while let Some(n) = next {
            if (n as usize) >= (p as usize) {
                break;
            }
            visited += 1;
            prev = Cursor::Node(n);
            next = self.next_of(prev);
        }

        let merges_with_prev = match prev {
            Cursor::Node(prev_ptr) => {
                let prev_node = self.node_at(prev_ptr);
                let prev_end = unsafe { prev_ptr.add(prev_node.size as usize) };
                ptr::eq(prev_end, p)
            }
            Cursor::Head => false,
        };

        let block: *mut u8 = if merges_with_prev {
            let Cursor::Node(prev_ptr) = prev else {
                unreachable!("merges_with_prev implies prev is a real node")
            };
            let mut prev_node = self.node_at(prev_ptr);
            prev_node.size += aligned_size;
            self.write_node_at(prev_ptr, prev_node);
            prev_ptr
        } else {
            let new_node = FreeNode::new(aligned_size, offset(next, self.base));
            self.write_node_at(p, new_node);
            self.set_next(prev, Some(p));
            p
        };

        if let Some(n) = next {
            let block_node = self.node_at(block);
            let block_end = unsafe { block.add(block_node.size as usize) };
            if ptr::eq(block_end, n) {
                let next_node = self.node_at(n);
                let mut merged = block_node;
                merged.size += next_node.size;
                merged.next_offset = next_node.next_offset;
                self.write_node_at(block, merged);

                if self.skip_hint == Cursor::Node(n) {
                    self.skip_hint = Cursor::Node(block);
                }
            }
        }

        self.skip_hint = prev;
        (used_skip_hint, visited)
    }

    /// Base address of the managed region.
    pub(crate) fn base(&self) -> *mut u8 {
        self.base
    }

    /// Total size of the managed region, in bytes.
    pub(crate) fn area_size(&self) -> usize {
        self.area_size
    }

    /// Iterate the sizes of every free region, in address order. Test/diagnostic use only.
    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn iter_sizes(&self) -> impl Iterator<Item = u32> + '_ {
        let mut cursor = self.next_of(Cursor::Head);
        core::iter::from_fn(move || {
            let p = cursor?;
            let node = self.node_at(p);
            cursor = self.next_of(Cursor::Node(p));
            Some(node.size)
        })
    }

    pub(crate) fn skip_hint_ptr(&self) -> Option<*mut u8> {
        match self.skip_hint {
            Cursor::Head => None,
            Cursor::Node(p) => Some(p),
        }
    }
}

#[inline]
pub(crate) const fn required_size(size: usize) -> u32 {
    align_up(size, ALIGNMENT) as u32
}
