//! Block header/footer encoding and neighbour navigation.
//!
//! A block is addressed by its *block pointer* `bp`: the address at which a
//! payload would begin. Its header lives at `bp - WSIZE`; if the block is
//! free, its footer lives at `bp + size(bp) - DSIZE`. None of this module
//! knows about allocation policy or free lists — it only packs and reads
//! raw header/footer words and walks to neighbouring blocks.
//!
//! All functions here are `unsafe`: every one of them dereferences `bp` (or
//! an offset from it) directly. Callers are responsible for `bp` pointing
//! at a live block within a heap that this crate is managing.

use crate::config::{ALLOC_BIT, DSIZE, PREV_ALLOC_BIT, WSIZE};

#[inline]
unsafe fn read_word(p: *const u8) -> u32 {
    unsafe { (p as *const u32).read_unaligned() }
}

#[inline]
unsafe fn write_word(p: *mut u8, value: u32) {
    unsafe { (p as *mut u32).write_unaligned(value) }
}

/// Packs a size, allocated flag, and prev-allocated flag into one header
/// word. `size` must already be a multiple of 8.
#[inline]
pub(crate) fn pack(size: usize, alloc: bool, prev_alloc: bool) -> u32 {
    debug_assert_eq!(size % 8, 0, "block size must be 8-byte aligned");
    size as u32 | if alloc { ALLOC_BIT } else { 0 } | if prev_alloc { PREV_ALLOC_BIT } else { 0 }
}

#[inline]
pub(crate) unsafe fn header_ptr(bp: *mut u8) -> *mut u8 {
    unsafe { bp.sub(WSIZE) }
}

/// Footer address for a block of `size` bytes starting at `bp`. Valid to
/// call even while `bp`'s header has not yet been rewritten to `size`, as
/// long as `size` is the block's true (post-merge) extent.
#[inline]
pub(crate) unsafe fn footer_ptr_of(bp: *mut u8, size: usize) -> *mut u8 {
    unsafe { bp.add(size - DSIZE) }
}

/// Footer address, reading `size` from `bp`'s own header.
#[inline]
pub(crate) unsafe fn footer_ptr(bp: *mut u8) -> *mut u8 {
    unsafe { footer_ptr_of(bp, size(bp)) }
}

/// Size of the block at `bp`, in bytes.
#[inline]
pub(crate) unsafe fn size(bp: *mut u8) -> usize {
    unsafe { (read_word(header_ptr(bp)) & !0x7) as usize }
}

/// Whether the block at `bp` is currently allocated.
#[inline]
pub(crate) unsafe fn is_allocated(bp: *mut u8) -> bool {
    unsafe { read_word(header_ptr(bp)) & ALLOC_BIT != 0 }
}

/// Whether the block immediately preceding `bp` is allocated.
#[inline]
pub(crate) unsafe fn is_prev_allocated(bp: *mut u8) -> bool {
    unsafe { read_word(header_ptr(bp)) & PREV_ALLOC_BIT != 0 }
}

/// Overwrites `bp`'s header in place.
#[inline]
pub(crate) unsafe fn set_header(bp: *mut u8, size: usize, alloc: bool, prev_alloc: bool) {
    unsafe { write_word(header_ptr(bp), pack(size, alloc, prev_alloc)) }
}

/// Overwrites `bp`'s footer in place. Only free blocks carry a footer;
/// callers must not call this for an allocated block.
#[inline]
pub(crate) unsafe fn set_footer(bp: *mut u8, size: usize, alloc: bool, prev_alloc: bool) {
    unsafe { write_word(footer_ptr_of(bp, size), pack(size, alloc, prev_alloc)) }
}

/// Writes a raw pre-packed header/footer word at an arbitrary address. Used
/// by the coalescer to rewrite a footer whose address is computed relative
/// to a different block pointer than the one supplying the size.
#[inline]
pub(crate) unsafe fn put_raw(addr: *mut u8, word: u32) {
    unsafe { write_word(addr, word) }
}

#[inline]
pub(crate) unsafe fn pack_raw(size: usize, alloc: bool, prev_alloc: bool) -> u32 {
    pack(size, alloc, prev_alloc)
}

/// The block pointer immediately following `bp`. Always valid to compute;
/// for the last real block this lands on the epilogue.
#[inline]
pub(crate) unsafe fn next_block(bp: *mut u8) -> *mut u8 {
    unsafe { bp.add(size(bp)) }
}

/// The block pointer immediately preceding `bp`.
///
/// # Safety
/// Only valid when `!is_prev_allocated(bp)`: a block with an allocated
/// predecessor has no footer to read the predecessor's size from.
#[inline]
pub(crate) unsafe fn prev_block(bp: *mut u8) -> *mut u8 {
    unsafe {
        let prev_footer = bp.sub(DSIZE);
        let prev_size = (read_word(prev_footer) & !0x7) as usize;
        bp.sub(prev_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_block<R>(total_words: usize, f: impl FnOnce(*mut u8) -> R) -> R {
        let mut buf = vec![0u8; total_words * WSIZE + WSIZE];
        // Leave one header word of slack before the "payload" so `bp - WSIZE`
        // stays inside the buffer.
        let bp = unsafe { buf.as_mut_ptr().add(WSIZE) };
        f(bp)
    }

    #[test]
    fn header_round_trips_size_and_flags() {
        with_block(4, |bp| unsafe {
            set_header(bp, 32, true, false);
            assert_eq!(size(bp), 32);
            assert!(is_allocated(bp));
            assert!(!is_prev_allocated(bp));

            set_header(bp, 32, false, true);
            assert_eq!(size(bp), 32);
            assert!(!is_allocated(bp));
            assert!(is_prev_allocated(bp));
        });
    }

    #[test]
    fn footer_mirrors_header_for_free_blocks() {
        with_block(4, |bp| unsafe {
            set_header(bp, 32, false, true);
            set_footer(bp, 32, false, true);
            assert_eq!(read_word(header_ptr(bp)), read_word(footer_ptr(bp)));
        });
    }

    #[test]
    fn next_block_lands_size_bytes_forward() {
        with_block(4, |bp| unsafe {
            set_header(bp, 16, true, true);
            assert_eq!(next_block(bp), bp.add(16));
        });
    }
}
