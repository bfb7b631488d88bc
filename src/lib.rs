//! # seglloc - A Segregated Free-List Memory Allocator
//!
//! This crate provides a **segregated free-list** allocator with boundary-tag
//! coalescing, managing memory using the `sbrk` system call.
//!
//! ## Overview
//!
//! Each block carries a packed header word (size, allocated bit,
//! prev-allocated bit); only free blocks carry a matching footer, so
//! neighbours can be located in both directions without wasting space on
//! allocated blocks:
//!
//! ```text
//!   Heap layout:
//!
//!   ┌────────────┬──────────┬────────┬────────┬─────┬────────┬───────────┐
//!   │ list heads │ prologue │ block1 │ block2 │ ... │ blockN │ epilogue  │
//!   └────────────┴──────────┴────────┴────────┴─────┴────────┴───────────┘
//!                 ▲
//!                 anchor: free-list offsets are relative to here
//!
//!   A free block:
//!   ┌────────┬──────┬──────┬─────────────────────────┬────────┐
//!   │ header │ pred │ succ │ ... unused payload ...   │ footer │
//!   └────────┴──────┴──────┴─────────────────────────┴────────┘
//!
//!   An allocated block:
//!   ┌────────┬───────────────────────────────────────────────┐
//!   │ header │                  payload                      │
//!   └────────┴───────────────────────────────────────────────┘
//! ```
//!
//! Free blocks of similar size are kept on one of [`config::N_SIZECLASS`]
//! circular doubly-linked lists (a doubling "ruler" of size classes), so
//! `acquire` only has to search the blocks that could plausibly fit.
//!
//! ## Crate Structure
//!
//! ```text
//!   seglloc
//!   ├── align      - Alignment macro (align8!)
//!   ├── config     - Layout constants and runtime-tunable knobs
//!   ├── error      - AllocError / CorruptReason
//!   ├── block      - Header/footer encoding and neighbour navigation (internal)
//!   ├── freelist   - Segregated free-list index (internal)
//!   ├── coalesce   - Boundary-tag coalescing (internal)
//!   ├── placement  - Split-or-consume-whole policy (internal)
//!   ├── provider   - HeapProvider trait, ProcessBreakProvider, ArenaProvider
//!   └── heap       - The public Heap<P> type
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seglloc::Heap;
//!
//! let mut heap = Heap::default();
//! heap.init().expect("failed to initialise heap");
//!
//! unsafe {
//!     let p = heap.acquire(64) as *mut u64;
//!     assert!(!p.is_null());
//!     *p = 42;
//!     heap.release(p as *mut u8);
//! }
//! ```
//!
//! ## C-shaped global surface
//!
//! For callers that want a single process-wide heap rather than an owned
//! [`Heap`] value, [`mm_init`], [`mm_malloc`], [`mm_free`], [`mm_realloc`],
//! [`mm_calloc`], and [`mm_check`] wrap a lazily-initialised
//! `Mutex<Option<Heap>>`. These mirror the allocator this crate is
//! descended from; prefer the `Heap` methods directly in new code.
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! Acquiring, releasing, and resizing blocks all require `unsafe` blocks,
//! and passing a pointer that did not come from the same `Heap` (or
//! double-releasing one) is undefined behaviour, exactly as with `malloc`/
//! `free`.

pub mod align;
pub(crate) mod block;
pub(crate) mod coalesce;
pub mod config;
pub mod error;
pub(crate) mod freelist;
pub mod heap;
pub(crate) mod placement;
pub mod provider;

pub use config::AllocatorConfig;
pub use error::{AllocError, AllocResult, CorruptReason};
pub use heap::Heap;
pub use provider::{HeapProvider, ProcessBreakProvider};

use std::sync::Mutex;

static GLOBAL: Mutex<Option<Heap>> = Mutex::new(None);

/// Initialises the process-wide heap. Safe to call more than once; each
/// call resets the global heap to a fresh, empty state.
pub fn mm_init() -> AllocResult {
    let mut slot = GLOBAL.lock().unwrap();
    let mut heap = Heap::default();
    heap.init()?;
    *slot = Some(heap);
    Ok(())
}

/// Acquires `size` bytes from the process-wide heap. Returns null on
/// failure or if [`mm_init`] has not been called yet.
///
/// # Safety
/// Identical contract to [`Heap::acquire`].
pub unsafe fn mm_malloc(size: usize) -> *mut u8 {
    let mut slot = GLOBAL.lock().unwrap();
    match slot.as_mut() {
        Some(heap) => heap.acquire(size),
        None => std::ptr::null_mut(),
    }
}

/// Releases a block previously returned by [`mm_malloc`]. No-op if the
/// global heap was never initialised.
///
/// # Safety
/// Identical contract to [`Heap::release`].
pub unsafe fn mm_free(p: *mut u8) {
    let mut slot = GLOBAL.lock().unwrap();
    if let Some(heap) = slot.as_mut() {
        heap.release(p);
    }
}

/// Resizes a block previously returned by [`mm_malloc`] or [`mm_realloc`].
///
/// # Safety
/// Identical contract to [`Heap::resize`].
pub unsafe fn mm_realloc(p: *mut u8, size: usize) -> *mut u8 {
    let mut slot = GLOBAL.lock().unwrap();
    match slot.as_mut() {
        Some(heap) => heap.resize(p, size),
        None => std::ptr::null_mut(),
    }
}

/// Acquires and zeroes `n * size` bytes from the process-wide heap.
///
/// # Safety
/// Identical contract to [`Heap::zero_acquire`].
pub unsafe fn mm_calloc(n: usize, size: usize) -> *mut u8 {
    let mut slot = GLOBAL.lock().unwrap();
    match slot.as_mut() {
        Some(heap) => heap.zero_acquire(n, size),
        None => std::ptr::null_mut(),
    }
}

/// Runs the full heap checker against the process-wide heap, aborting on
/// the first violation. `line` is folded into the diagnostic, mirroring
/// callers that pass `__LINE__` in the allocator this crate is descended
/// from.
pub fn mm_check(line: u32) {
    let slot = GLOBAL.lock().unwrap();
    if let Some(heap) = slot.as_ref() {
        heap.check(line);
    }
}
