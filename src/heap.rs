//! The public allocator surface: a `Heap` value that owns the sentinels,
//! the free-list head table, and a backing [`HeapProvider`], and
//! implements acquire / release / resize / zero-acquire in terms of the
//! block-encoding, free-list, coalescing, and placement modules.

use std::ptr;

use log::{debug, error, trace};

use crate::align8;
use crate::block;
use crate::coalesce;
use crate::config::{AllocatorConfig, DSIZE, MIN_BLOCK_SIZE, N_SIZECLASS, WSIZE};
use crate::error::{AllocError, AllocResult, CorruptReason};
use crate::freelist;
use crate::placement;
use crate::provider::{HeapProvider, ProcessBreakProvider};

/// Canonicalises a user-requested payload size into a block size: room for
/// the header, rounded up to 8 bytes, floored at the minimum block size.
pub(crate) fn canonical_size(user_size: usize) -> usize {
    (align8!(user_size + WSIZE)).max(MIN_BLOCK_SIZE)
}

/// A single private heap: sentinels, segregated free lists, and a backing
/// provider.
///
/// `P` defaults to [`ProcessBreakProvider`] so `Heap::default()` gives a
/// real `sbrk`-backed allocator; tests substitute an arena-backed provider
/// to exercise out-of-memory and extension paths deterministically.
pub struct Heap<P: HeapProvider = ProcessBreakProvider> {
    provider: P,
    config: AllocatorConfig,
    /// Base of the list-head table, or null before `init`.
    heads: *mut u8,
    /// Anchor for free-list offsets: the prologue's payload address.
    anchor: *mut u8,
    /// Address of the epilogue's header word.
    epi_hdr: *mut u8,
}

// The heap owns exactly one contiguous region and is never accessed from
// more than one thread at a time (see SPEC_FULL.md §5); `Heap` is `Send`
// so it can be moved behind a `Mutex`; it is deliberately not `Sync`.
unsafe impl<P: HeapProvider + Send> Send for Heap<P> {}

impl<P: HeapProvider> Heap<P> {
    /// Builds an uninitialised heap around `provider`. Call [`Heap::init`]
    /// before using it.
    pub fn with_provider(provider: P) -> Self {
        Self::with_provider_and_config(provider, AllocatorConfig::default())
    }

    /// As [`Heap::with_provider`], overriding the heap-extension
    /// granularity.
    pub fn with_provider_and_config(provider: P, config: AllocatorConfig) -> Self {
        Self {
            provider,
            config,
            heads: ptr::null_mut(),
            anchor: ptr::null_mut(),
            epi_hdr: ptr::null_mut(),
        }
    }

    /// `(re)`initialises the heap: resets all internal state, lays down
    /// the head table and sentinels, then performs the first heap
    /// extension. Safe to call more than once on the same value, matching
    /// the original allocator's `init`-as-reset contract.
    pub fn init(&mut self) -> AllocResult {
        self.provider.init();
        self.heads = ptr::null_mut();
        self.anchor = ptr::null_mut();
        self.epi_hdr = ptr::null_mut();

        let padding = if N_SIZECLASS % 2 == 0 { 1 } else { 0 };
        let words = 3 + N_SIZECLASS + padding;
        let heads = self.provider.sbrk((words * WSIZE) as isize)?;

        for class in 0..N_SIZECLASS {
            unsafe { block::put_raw(heads.add(class * WSIZE), 0) };
        }

        let mut anchor = unsafe { heads.add((N_SIZECLASS + padding) * WSIZE) };
        if padding == 1 {
            unsafe { block::put_raw(anchor.sub(WSIZE), 0) };
        }

        unsafe {
            // Prologue header: size DSIZE, allocated, prev_allocated (no
            // real predecessor, so it is vacuously "allocated").
            block::put_raw(anchor, block::pack_raw(DSIZE, true, true));
            // Prologue padding word, unused.
            block::put_raw(anchor.add(WSIZE), 0);
            // Epilogue header: zero-sized, allocated.
            block::put_raw(anchor.add(2 * WSIZE), block::pack_raw(0, true, true));
        }

        anchor = unsafe { anchor.add(WSIZE) }; // now points at the prologue's payload
        self.heads = heads;
        self.anchor = anchor;
        self.epi_hdr = unsafe { anchor.add(WSIZE) };

        debug!(
            "heap init: heads = {:p}, anchor = {:p}, epilogue = {:p}",
            self.heads, self.anchor, self.epi_hdr
        );

        let fbp = unsafe { self.extend(self.config.chunk_size / WSIZE, true)? };
        unsafe { freelist::insert(self.heads, self.anchor, fbp) };

        Ok(())
    }

    /// Grows the heap by `words` (rounded to an even count) and hands the
    /// resulting free block to the coalescer. Does not insert the result
    /// into any free list; callers do that themselves.
    unsafe fn extend(&mut self, words: usize, inherited_prev_alloc: bool) -> Result<*mut u8, AllocError> {
        let words = if words % 2 == 1 { words + 1 } else { words };
        let size = words * WSIZE;

        let bp = self.provider.sbrk(size as isize)?;

        unsafe {
            block::set_header(bp, size, false, inherited_prev_alloc);
            block::set_footer(bp, size, false, inherited_prev_alloc);

            self.epi_hdr = block::header_ptr(block::next_block(bp));
            block::put_raw(self.epi_hdr, block::pack_raw(0, true, false));
        }

        debug!("extend_heap({words} words): new epilogue at {:p}", self.epi_hdr);

        Ok(unsafe { coalesce::coalesce(self.heads, self.anchor, bp) })
    }

    /// Acquires a block of at least `size` bytes, or `Err` if the
    /// request is invalid or the backing provider is exhausted.
    pub fn try_acquire(&mut self, size: usize) -> AllocResult<*mut u8> {
        if size == 0 {
            return Err(AllocError::InvalidArgument);
        }

        let asize = canonical_size(size);
        trace!("acquire({size}): asize = {asize}");

        let mut bp = unsafe { freelist::find_fit(self.heads, self.anchor, asize) };

        if bp.is_null() {
            let esize = asize.max(self.config.chunk_size);
            let epalloc = unsafe { block::is_prev_allocated(self.epi_hdr) };
            bp = unsafe { self.extend(esize / WSIZE, epalloc)? };
            unsafe { freelist::insert(self.heads, self.anchor, bp) };
        }

        unsafe { placement::place(self.heads, self.anchor, bp, asize) };
        trace!("acquire({size}): returning {:p}", bp);
        Ok(bp)
    }

    /// `acquire`, collapsing any error to a null pointer per the C-shaped
    /// contract.
    pub fn acquire(&mut self, size: usize) -> *mut u8 {
        self.try_acquire(size).unwrap_or(ptr::null_mut())
    }

    /// Releases a previously acquired block. `p == null` is a no-op.
    pub fn release(&mut self, p: *mut u8) {
        if p.is_null() {
            return;
        }

        trace!("release({:p})", p);

        unsafe {
            let size = block::size(p);
            let prev_alloc = block::is_prev_allocated(p);
            block::set_header(p, size, false, prev_alloc);
            block::set_footer(p, size, false, prev_alloc);

            let next = block::next_block(p);
            let next_size = block::size(next);
            let next_alloc = block::is_allocated(next);
            // Only the prev_allocated bit changes here; if `next` is free
            // its footer briefly disagrees, but coalesce() immediately
            // consumes it, so no block with a stale footer ever outlives
            // this call.
            block::set_header(next, next_size, next_alloc, false);

            let merged = coalesce::coalesce(self.heads, self.anchor, p);
            freelist::insert(self.heads, self.anchor, merged);
        }
    }

    /// Resizes a block, preserving `min(old_size, size)` bytes of its
    /// content. `p == null` behaves as `acquire`; `size == 0` behaves as
    /// `release`.
    pub fn try_resize(&mut self, p: *mut u8, size: usize) -> AllocResult<*mut u8> {
        if p.is_null() {
            return self.try_acquire(size);
        }
        if size == 0 {
            self.release(p);
            return Ok(ptr::null_mut());
        }

        let new_ptr = self.try_acquire(size)?;
        unsafe {
            let old_block_size = block::size(p);
            let copy_len = old_block_size.min(size);
            ptr::copy_nonoverlapping(p, new_ptr, copy_len);
        }
        self.release(p);
        Ok(new_ptr)
    }

    /// `resize`, collapsing any error to a null pointer.
    pub fn resize(&mut self, p: *mut u8, size: usize) -> *mut u8 {
        match self.try_resize(p, size) {
            Ok(ptr) => ptr,
            Err(_) => ptr::null_mut(),
        }
    }

    /// Acquires `n * size` bytes and zeroes them. Returns null without
    /// writing anything if the underlying acquire fails.
    pub fn zero_acquire(&mut self, n: usize, size: usize) -> *mut u8 {
        let bytes = n * size;
        let p = self.acquire(bytes);
        if !p.is_null() {
            unsafe { ptr::write_bytes(p, 0, bytes) };
        }
        p
    }

    fn in_heap(&self, addr: *const u8) -> bool {
        addr >= self.provider.heap_lo() && addr <= self.provider.heap_hi()
    }

    fn aligned(addr: *const u8) -> bool {
        (addr as usize) % crate::config::ALIGNMENT == 0
    }

    /// Verifies every invariant in `SPEC_FULL.md` §3 against the live
    /// heap. Returns the first violation found, if any.
    pub fn verify(&self) -> AllocResult {
        unsafe {
            if !self.in_heap(self.anchor)
                || !block::is_allocated(self.anchor)
                || block::size(self.anchor) != DSIZE
                || !block::is_prev_allocated(self.anchor)
            {
                return Err(AllocError::CorruptHeap(CorruptReason::Prologue {
                    addr: self.anchor as usize,
                }));
            }

            if !self.in_heap(self.epi_hdr) {
                return Err(AllocError::CorruptHeap(CorruptReason::Epilogue {
                    addr: self.epi_hdr as usize,
                }));
            }
            let epi_word = (self.epi_hdr as *const u32).read_unaligned();
            if epi_word & 0x1 == 0 || (epi_word & !0x7) != 0 {
                return Err(AllocError::CorruptHeap(CorruptReason::Epilogue {
                    addr: self.epi_hdr as usize,
                }));
            }

            let mut scanned_free = 0usize;
            let mut ptr = self.anchor;
            while block::size(ptr) != 0 {
                if !Self::aligned(ptr) {
                    return Err(AllocError::CorruptHeap(CorruptReason::Unaligned {
                        addr: ptr as usize,
                    }));
                }

                // The prologue is a special sentinel of exactly `DSIZE`
                // bytes (already validated above) and is exempt from the
                // general minimum-block-size invariant that applies to
                // every block in the heap proper.
                let block_size = block::size(ptr);
                if ptr != self.anchor && (block_size < MIN_BLOCK_SIZE || block_size % 8 != 0) {
                    return Err(AllocError::CorruptHeap(CorruptReason::BadSize {
                        addr: ptr as usize,
                        size: block_size,
                    }));
                }

                let is_free = !block::is_allocated(ptr);
                if is_free {
                    scanned_free += 1;
                    let header = (block::header_ptr(ptr) as *const u32).read_unaligned();
                    let footer = (block::footer_ptr(ptr) as *const u32).read_unaligned();
                    if header != footer {
                        return Err(AllocError::CorruptHeap(CorruptReason::HeaderFooterMismatch {
                            addr: ptr as usize,
                        }));
                    }
                }

                let next = block::next_block(ptr);
                if is_free && !block::is_allocated(next) {
                    return Err(AllocError::CorruptHeap(CorruptReason::AdjacentFreeBlocks {
                        addr: ptr as usize,
                    }));
                }
                if is_free == block::is_prev_allocated(next) {
                    return Err(AllocError::CorruptHeap(CorruptReason::PrevAllocMismatch {
                        addr: next as usize,
                    }));
                }

                ptr = next;
            }

            let mut listed_free = 0usize;
            for class in 0..N_SIZECLASS {
                let mut err = None;
                freelist::for_each_in_class(self.heads, self.anchor, class, |fbp| {
                    if err.is_some() {
                        return;
                    }
                    listed_free += 1;
                    if !self.in_heap(fbp) {
                        err = Some(CorruptReason::NotInHeap { addr: fbp as usize });
                        return;
                    }
                    if freelist::succ(freelist::pred(fbp)) != fbp
                        || freelist::pred(freelist::succ(fbp)) != fbp
                    {
                        err = Some(CorruptReason::BrokenLink { addr: fbp as usize });
                        return;
                    }
                    let expected = freelist::size_class(block::size(fbp));
                    if expected != class {
                        err = Some(CorruptReason::WrongSizeClass {
                            addr: fbp as usize,
                            class,
                            expected,
                        });
                    }
                });
                if let Some(reason) = err {
                    return Err(AllocError::CorruptHeap(reason));
                }
            }

            if scanned_free != listed_free {
                return Err(AllocError::CorruptHeap(CorruptReason::FreeCountMismatch {
                    scanned: scanned_free,
                    listed: listed_free,
                }));
            }
        }

        Ok(())
    }

    /// Runs [`Heap::verify`] and aborts the process on the first
    /// violation, logging which invariant failed and at what address —
    /// matching the fatal-diagnostic contract in `SPEC_FULL.md` §7.
    ///
    /// Compiled out entirely when the `checked` feature is disabled, so a
    /// production embedding can drop every call site's cost to zero
    /// without touching call sites.
    #[cfg(feature = "checked")]
    pub fn check(&self, line: u32) {
        if let Err(violation) = self.verify() {
            error!("heap check failed at line {line}: {violation}");
            std::process::abort();
        }
    }

    /// No-op when the `checked` feature is disabled; see the feature-gated
    /// overload above for the real checker.
    #[cfg(not(feature = "checked"))]
    #[inline(always)]
    pub fn check(&self, _line: u32) {}
}

impl Default for Heap<ProcessBreakProvider> {
    fn default() -> Self {
        Self::with_provider(ProcessBreakProvider::default())
    }
}
