//! Boundary-tag coalescing: merges a just-freed block with whichever of
//! its immediate neighbours are also free.
//!
//! The caller is responsible for having already written `bp`'s header and
//! footer as free *before* calling [`coalesce`], and for inserting the
//! returned block into the free-list index afterwards — this function
//! only merges and removes consumed neighbours from their lists.

use crate::block;
use crate::freelist;

/// Merges `bp` with its free neighbours, removing any neighbour consumed
/// in the process from its size class. Returns the (possibly grown) block
/// pointer of the surviving merged block.
pub(crate) unsafe fn coalesce(heads: *mut u8, anchor: *mut u8, bp: *mut u8) -> *mut u8 {
    unsafe {
        let prev_alloc = block::is_prev_allocated(bp);
        let next = block::next_block(bp);
        let next_alloc = block::is_allocated(next);
        let size = block::size(bp);

        if prev_alloc && next_alloc {
            return bp;
        }

        if prev_alloc && !next_alloc {
            let merged = size + block::size(next);
            freelist::remove(heads, anchor, next);
            block::set_header(bp, merged, false, true);
            block::set_footer(bp, merged, false, true);
            return bp;
        }

        if !prev_alloc && next_alloc {
            let prev = block::prev_block(bp);
            let merged = size + block::size(prev);
            let prev_prev_alloc = block::is_prev_allocated(prev);
            freelist::remove(heads, anchor, prev);
            // The footer of the merged block sits where `bp`'s own footer
            // would have been computed from its old size: old bp + old
            // size - DSIZE == new prev + merged size - DSIZE.
            let footer = block::footer_ptr_of(bp, size);
            block::put_raw(footer, block::pack_raw(merged, false, prev_prev_alloc));
            block::set_header(prev, merged, false, prev_prev_alloc);
            return prev;
        }

        // !prev_alloc && !next_alloc
        let prev = block::prev_block(bp);
        let next_size = block::size(next);
        let merged = size + block::size(prev) + next_size;
        let prev_prev_alloc = block::is_prev_allocated(prev);
        freelist::remove(heads, anchor, prev);
        freelist::remove(heads, anchor, next);
        block::set_header(prev, merged, false, prev_prev_alloc);
        let footer = block::footer_ptr_of(next, next_size);
        block::put_raw(footer, block::pack_raw(merged, false, prev_prev_alloc));
        prev
    }
}
