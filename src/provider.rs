//! The sbrk-like backing collaborator.
//!
//! [`HeapProvider`] abstracts "extend the high watermark by N bytes" plus
//! the two boundary queries the checker needs. [`ProcessBreakProvider`] is
//! the real implementation, backed by `libc::sbrk` exactly as a plain bump
//! allocator would use it. A second, test-only implementation
//! ([`ArenaProvider`], under `#[cfg(test)]`) backs the heap with a fixed
//! boxed buffer instead of the process break, so out-of-memory behaviour
//! can be exercised deterministically.

use std::ptr;

use crate::error::AllocError;

/// A source of heap memory that only ever grows.
pub trait HeapProvider {
    /// Resets the provider to its initial, empty state. Idempotent.
    fn init(&mut self);

    /// Extends the high watermark by `increment` bytes (always positive
    /// and 8-aligned when called from this crate) and returns the address
    /// of the first new byte, or [`AllocError::OutOfMemory`] if the
    /// provider cannot grow further.
    fn sbrk(&mut self, increment: isize) -> Result<*mut u8, AllocError>;

    /// Inclusive lower bound of the region the provider has handed out so
    /// far. Used only by the checker.
    fn heap_lo(&self) -> *const u8;

    /// Inclusive upper bound of the region the provider has handed out so
    /// far. Used only by the checker.
    fn heap_hi(&self) -> *const u8;
}

/// Grows the real process break via `sbrk(2)`, the same collaborator the
/// teacher bump allocator in this crate's lineage used.
pub struct ProcessBreakProvider {
    lo: Option<*mut u8>,
    hi: *mut u8,
}

impl ProcessBreakProvider {
    pub fn new() -> Self {
        Self {
            lo: None,
            hi: ptr::null_mut(),
        }
    }
}

impl Default for ProcessBreakProvider {
    fn default() -> Self {
        Self::new()
    }
}

// The allocator is single-threaded and non-reentrant (no two `Heap`s ever
// touch the process break at once), so a `ProcessBreakProvider` raw pointer
// pair is never accessed from two threads concurrently. This just lets the
// provider (and any `Heap<ProcessBreakProvider>` wrapping it) live behind a
// `Mutex` in a `static`; it is not a claim that `sbrk` itself is thread-safe.
unsafe impl Send for ProcessBreakProvider {}

impl HeapProvider for ProcessBreakProvider {
    fn init(&mut self) {
        self.lo = None;
        self.hi = ptr::null_mut();
    }

    fn sbrk(&mut self, increment: isize) -> Result<*mut u8, AllocError> {
        let raw = unsafe { libc::sbrk(increment as libc::intptr_t) };
        if raw == usize::MAX as *mut libc::c_void {
            return Err(AllocError::OutOfMemory);
        }

        let addr = raw as *mut u8;
        if self.lo.is_none() {
            self.lo = Some(addr);
        }
        self.hi = unsafe { addr.offset(increment).sub(1) };
        Ok(addr)
    }

    fn heap_lo(&self) -> *const u8 {
        self.lo.unwrap_or(ptr::null_mut()) as *const u8
    }

    fn heap_hi(&self) -> *const u8 {
        self.hi as *const u8
    }
}

#[cfg(test)]
pub(crate) struct ArenaProvider {
    arena: Box<[u8]>,
    used: usize,
}

#[cfg(test)]
impl ArenaProvider {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }
}

#[cfg(test)]
impl HeapProvider for ArenaProvider {
    fn init(&mut self) {
        self.used = 0;
    }

    fn sbrk(&mut self, increment: isize) -> Result<*mut u8, AllocError> {
        if increment < 0 {
            return Err(AllocError::InvalidArgument);
        }
        let increment = increment as usize;
        if self.used.saturating_add(increment) > self.arena.len() {
            return Err(AllocError::OutOfMemory);
        }

        let ptr = unsafe { self.arena.as_mut_ptr().add(self.used) };
        self.used += increment;
        Ok(ptr)
    }

    fn heap_lo(&self) -> *const u8 {
        self.arena.as_ptr()
    }

    fn heap_hi(&self) -> *const u8 {
        if self.used == 0 {
            self.arena.as_ptr()
        } else {
            unsafe { self.arena.as_ptr().add(self.used - 1) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_provider_grows_contiguously() {
        let mut arena = ArenaProvider::with_capacity(64);
        let a = arena.sbrk(16).unwrap();
        let b = arena.sbrk(16).unwrap();
        assert_eq!(unsafe { a.add(16) }, b);
    }

    #[test]
    fn arena_provider_reports_out_of_memory() {
        let mut arena = ArenaProvider::with_capacity(16);
        assert!(arena.sbrk(8).is_ok());
        assert_eq!(arena.sbrk(16), Err(AllocError::OutOfMemory));
    }
}
