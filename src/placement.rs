//! Placement policy: given a free block located by [`crate::freelist::find_fit`],
//! decide whether to split it or consume it whole.

use crate::block;
use crate::config::MIN_BLOCK_SIZE;
use crate::freelist;

/// Removes `bp` from its free list, then either splits it (keeping a free
/// remainder of at least [`MIN_BLOCK_SIZE`] bytes) or marks it allocated
/// whole.
///
/// `asize` must already be canonicalised (8-aligned, `>= MIN_BLOCK_SIZE`)
/// and `bp` must be large enough to satisfy it.
pub(crate) unsafe fn place(heads: *mut u8, anchor: *mut u8, bp: *mut u8, asize: usize) {
    unsafe {
        freelist::remove(heads, anchor, bp);

        let csize = block::size(bp);
        let prev_alloc = block::is_prev_allocated(bp);
        debug_assert!(csize >= asize, "place() called with an undersized block");

        if csize - asize >= MIN_BLOCK_SIZE {
            block::set_header(bp, asize, true, prev_alloc);

            let remainder = bp.add(asize);
            let rsize = csize - asize;
            block::set_header(remainder, rsize, false, true);
            block::set_footer(remainder, rsize, false, true);
            freelist::insert(heads, anchor, remainder);
        } else {
            block::set_header(bp, csize, true, prev_alloc);

            let next = block::next_block(bp);
            // No two adjacent free blocks ever coexist (coalescing is
            // maximal), and `bp` was free until this call, so `next` must
            // already be allocated.
            debug_assert!(
                block::is_allocated(next),
                "block following a whole-consumed free block must already be allocated"
            );
            let nsize = block::size(next);
            block::set_header(next, nsize, true, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{N_SIZECLASS, WSIZE};

    /// A free candidate block followed by an allocated sentinel, with a
    /// head table so `place`'s leading `freelist::remove` and (on the
    /// split path) trailing `freelist::insert` have somewhere to act.
    struct Arena {
        #[allow(dead_code)]
        buf: Vec<u8>,
        heads: *mut u8,
        anchor: *mut u8,
    }

    impl Arena {
        fn new(candidate_size: usize) -> Self {
            let heads_bytes = N_SIZECLASS * WSIZE;
            let mut buf = vec![0u8; heads_bytes + WSIZE + candidate_size + 32];
            let heads = buf.as_mut_ptr();
            let anchor = unsafe { heads.add(heads_bytes + WSIZE) };
            Self { buf, heads, anchor }
        }

        fn candidate(&self) -> *mut u8 {
            self.anchor
        }

        fn following(&self, candidate_size: usize) -> *mut u8 {
            unsafe { self.anchor.add(candidate_size) }
        }
    }

    #[test]
    fn splits_off_a_free_remainder_when_it_meets_the_minimum_block_size() {
        let arena = Arena::new(64);
        let bp = arena.candidate();
        let next = arena.following(64);

        unsafe {
            block::set_header(bp, 64, false, true);
            block::set_footer(bp, 64, false, true);
            freelist::insert(arena.heads, arena.anchor, bp);
            block::set_header(next, 32, true, false);

            place(arena.heads, arena.anchor, bp, 32);

            assert!(block::is_allocated(bp));
            assert_eq!(block::size(bp), 32);
            assert!(block::is_prev_allocated(bp));

            let remainder = block::next_block(bp);
            assert!(!block::is_allocated(remainder));
            assert_eq!(block::size(remainder), 32);
            assert!(block::is_prev_allocated(remainder));

            // The split remainder must be reachable again through the
            // free-list index, not just by pointer arithmetic.
            let found = freelist::find_fit(arena.heads, arena.anchor, 32);
            assert_eq!(found, remainder);
        }
    }

    #[test]
    fn consumes_the_whole_block_when_the_remainder_would_be_too_small() {
        let arena = Arena::new(40);
        let bp = arena.candidate();
        let next = arena.following(40);

        unsafe {
            block::set_header(bp, 40, false, true);
            block::set_footer(bp, 40, false, true);
            freelist::insert(arena.heads, arena.anchor, bp);
            block::set_header(next, 32, true, false);

            // 40 - 32 == 8, below the 16-byte minimum, so no split.
            place(arena.heads, arena.anchor, bp, 32);

            assert!(block::is_allocated(bp));
            assert_eq!(block::size(bp), 40);
            assert!(block::is_prev_allocated(next));
        }
    }
}
