//! Segregated free-list index: size-class selection plus O(1) insert,
//! delete, and first-fit lookup over circular doubly-linked lists.
//!
//! The head table is an array of `N_SIZECLASS` 32-bit signed offsets,
//! relative to an `anchor` pointer (the prologue's payload address). A
//! table entry of `0` means "list empty". Each free block stores its own
//! predecessor/successor links the same way: as offsets *from the block
//! itself*, not from the anchor — this lets the whole heap be addressed
//! with 32-bit quantities on a 64-bit host and keeps the minimum block at
//! 16 bytes.
//!
//! Every function here takes `heads` and `anchor` explicitly rather than
//! bundling them into a struct; [`crate::heap::Heap`] owns both pointers
//! and passes them through, since the free-list index has no state of its
//! own beyond what already lives in the heap.

use core::ptr;

use crate::block;
use crate::config::{MIN_BLOCK_SIZE, N_SIZECLASS, WSIZE};

/// Picks the size class for a block (or request) of `size` bytes: the
/// first class whose ruler is `>= size`, doubling from `MIN_BLOCK_SIZE`,
/// saturating at the last class.
pub(crate) fn size_class(size: usize) -> usize {
    let mut i = 0;
    let mut ruler = MIN_BLOCK_SIZE;
    while i < N_SIZECLASS - 1 && size > ruler {
        i += 1;
        ruler <<= 1;
    }
    i
}

#[inline]
unsafe fn head_offp(heads: *mut u8, class: usize) -> *mut u8 {
    unsafe { heads.add(class * WSIZE) }
}

#[inline]
unsafe fn get_offset(p: *mut u8) -> i32 {
    unsafe { (p as *const i32).read_unaligned() }
}

#[inline]
unsafe fn put_offset(p: *mut u8, value: i32) {
    unsafe { (p as *mut i32).write_unaligned(value) }
}

#[inline]
unsafe fn offset_between(from: *mut u8, to: *mut u8) -> i32 {
    (to as isize - from as isize) as i32
}

/// The head free block of `class`, or null if that list is empty.
unsafe fn head(heads: *mut u8, anchor: *mut u8, class: usize) -> *mut u8 {
    unsafe {
        let off = get_offset(head_offp(heads, class));
        if off == 0 {
            ptr::null_mut()
        } else {
            anchor.offset(off as isize)
        }
    }
}

unsafe fn set_head(heads: *mut u8, class: usize, value: i32) {
    unsafe { put_offset(head_offp(heads, class), value) }
}

#[inline]
unsafe fn pred_offp(fbp: *mut u8) -> *mut u8 {
    fbp
}

#[inline]
unsafe fn succ_offp(fbp: *mut u8) -> *mut u8 {
    unsafe { fbp.add(WSIZE) }
}

pub(crate) unsafe fn pred(fbp: *mut u8) -> *mut u8 {
    unsafe { fbp.offset(get_offset(pred_offp(fbp)) as isize) }
}

pub(crate) unsafe fn succ(fbp: *mut u8) -> *mut u8 {
    unsafe { fbp.offset(get_offset(succ_offp(fbp)) as isize) }
}

/// Links `fbp` into its size class, immediately before the current head
/// (i.e. at the tail of the circular chain). A freshly emptied class gets
/// `fbp` as a self-linked singleton head. This is tail-insertion, not the
/// head-insertion the original comment claimed; see `DESIGN.md`.
pub(crate) unsafe fn insert(heads: *mut u8, anchor: *mut u8, fbp: *mut u8) {
    unsafe {
        let class = size_class(block::size(fbp));
        let h = head(heads, anchor, class);

        if h.is_null() {
            set_head(heads, class, offset_between(anchor, fbp));
            put_offset(pred_offp(fbp), 0);
            put_offset(succ_offp(fbp), 0);
        } else {
            let p = pred(h);
            put_offset(pred_offp(fbp), offset_between(fbp, p));
            put_offset(succ_offp(p), offset_between(p, fbp));
            put_offset(succ_offp(fbp), offset_between(fbp, h));
            put_offset(pred_offp(h), offset_between(h, fbp));
        }
    }
}

/// Splices `fbp` out of its size class.
pub(crate) unsafe fn remove(heads: *mut u8, anchor: *mut u8, fbp: *mut u8) {
    unsafe {
        let class = size_class(block::size(fbp));
        let h = head(heads, anchor, class);

        if fbp == h {
            if succ(fbp) == h {
                set_head(heads, class, 0);
                return;
            }
            set_head(heads, class, offset_between(anchor, succ(fbp)));
        }

        let p = pred(fbp);
        let s = succ(fbp);
        put_offset(succ_offp(p), offset_between(p, s));
        put_offset(pred_offp(s), offset_between(s, p));
    }
}

/// First-fit search: scans classes from the one `asize` belongs to upward,
/// returning the first free block whose size is `>= asize`.
pub(crate) unsafe fn find_fit(heads: *mut u8, anchor: *mut u8, asize: usize) -> *mut u8 {
    unsafe {
        let mut class = size_class(asize);

        while class < N_SIZECLASS {
            let h = head(heads, anchor, class);
            if h.is_null() {
                class += 1;
                continue;
            }

            if !block::is_allocated(h) && asize <= block::size(h) {
                return h;
            }

            let mut fbp = succ(h);
            while fbp != h {
                if !block::is_allocated(fbp) && asize <= block::size(fbp) {
                    return fbp;
                }
                fbp = succ(fbp);
            }

            class += 1;
        }

        ptr::null_mut()
    }
}

/// Invokes `f` for every free block in `class`, in list order starting
/// from the head. Used by the heap checker to cross-validate the count of
/// free blocks against a forward scan.
pub(crate) unsafe fn for_each_in_class(
    heads: *mut u8,
    anchor: *mut u8,
    class: usize,
    mut f: impl FnMut(*mut u8),
) {
    unsafe {
        let h = head(heads, anchor, class);
        if h.is_null() {
            return;
        }
        f(h);
        let mut fbp = succ(h);
        while fbp != h {
            f(fbp);
            fbp = succ(fbp);
        }
    }
}
