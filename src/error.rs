//! Unified error type for the allocator.
//!
//! Mirrors the three error kinds the allocator actually distinguishes:
//! the backing provider refusing to grow, a contract violation on the
//! public surface, and a corrupt heap caught by the checker. The public
//! C-shaped entry points (`acquire`, `resize`, `zero_acquire`) collapse any
//! `Err` to a null pointer; callers who want the distinction use the
//! `Heap::try_*` methods instead.

use std::fmt;

/// Why a heap-checking pass failed, with enough context to locate the
/// offending block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptReason {
    /// The prologue sentinel does not match its canonical bit pattern.
    Prologue { addr: usize },
    /// The epilogue sentinel does not match its canonical bit pattern.
    Epilogue { addr: usize },
    /// A block's size is smaller than the minimum block size, or not a
    /// multiple of 8.
    BadSize { addr: usize, size: usize },
    /// A free-list node sits in a size class other than the one its own
    /// size maps to.
    WrongSizeClass { addr: usize, class: usize, expected: usize },
    /// A payload address is not 8-byte aligned.
    Unaligned { addr: usize },
    /// A free block's header and footer words disagree.
    HeaderFooterMismatch { addr: usize },
    /// Two adjacent blocks are both free; coalescing should have merged them.
    AdjacentFreeBlocks { addr: usize },
    /// A block's `prev_allocated` bit disagrees with its predecessor's
    /// actual allocation state.
    PrevAllocMismatch { addr: usize },
    /// A free-list node lies outside `[heap_lo, heap_hi]`.
    NotInHeap { addr: usize },
    /// `succ(pred(x)) != x` or `pred(succ(x)) != x` for some free-list node.
    BrokenLink { addr: usize },
    /// The free-block count found by forward scan disagrees with the count
    /// found by walking every segregated list.
    FreeCountMismatch { scanned: usize, listed: usize },
}

impl fmt::Display for CorruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prologue { addr } => write!(f, "prologue sentinel corrupt at {addr:#x}"),
            Self::Epilogue { addr } => write!(f, "epilogue sentinel corrupt at {addr:#x}"),
            Self::BadSize { addr, size } => {
                write!(f, "block at {addr:#x} has invalid size {size} (must be >= 16 and a multiple of 8)")
            }
            Self::WrongSizeClass { addr, class, expected } => write!(
                f,
                "free block at {addr:#x} is listed in size class {class} but belongs in {expected}"
            ),
            Self::Unaligned { addr } => write!(f, "block at {addr:#x} is not 8-byte aligned"),
            Self::HeaderFooterMismatch { addr } => {
                write!(f, "free block at {addr:#x} has mismatched header/footer")
            }
            Self::AdjacentFreeBlocks { addr } => {
                write!(f, "block at {addr:#x} and its successor are both free")
            }
            Self::PrevAllocMismatch { addr } => {
                write!(f, "block at {addr:#x} has a stale prev_allocated bit")
            }
            Self::NotInHeap { addr } => {
                write!(f, "free-list node at {addr:#x} lies outside the heap")
            }
            Self::BrokenLink { addr } => {
                write!(f, "free-list node at {addr:#x} has an inconsistent pred/succ link")
            }
            Self::FreeCountMismatch { scanned, listed } => write!(
                f,
                "free block count mismatch: {scanned} by forward scan vs {listed} by list walk"
            ),
        }
    }
}

/// An allocator operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The backing provider refused to extend the heap.
    OutOfMemory,
    /// The caller's request is outside the operation's contract
    /// (e.g. `acquire(0)`).
    InvalidArgument,
    /// The heap checker found a violated invariant; the process should not
    /// continue.
    CorruptHeap(CorruptReason),
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "backing provider refused to extend the heap"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::CorruptHeap(reason) => write!(f, "heap invariant violated: {reason}"),
        }
    }
}

impl std::error::Error for AllocError {}

/// Convenience result type for fallible allocator operations.
pub type AllocResult<T = ()> = Result<T, AllocError>;
