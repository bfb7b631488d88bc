//! Compile-time layout constants and the runtime-tunable knobs layered on top
//! of them.
//!
//! The constants mirror the `#define`s of the allocator this crate is
//! descended from one-to-one: `WSIZE`/`DSIZE` are the header/footer word
//! sizes, `CHUNKSIZE` is the default heap-extension granularity, and
//! `N_SIZECLASS` is the number of segregated free lists.

/// User-payload alignment guarantee, in bytes.
pub const ALIGNMENT: usize = 8;

/// Size of a header or footer word, and of a free-list link field.
pub const WSIZE: usize = 4;

/// Double-word size: header + footer, or a block's minimum footer offset.
pub const DSIZE: usize = 8;

/// Default number of bytes requested from the backing provider whenever
/// `find_fit` fails to locate a suitable free block.
pub const CHUNKSIZE: usize = 4096;

/// Number of segregated free lists. The first covers sizes in
/// `(0, MIN_BLOCK_SIZE]`, and each subsequent class doubles the ruler; the
/// last class is unbounded above.
pub const N_SIZECLASS: usize = 12;

/// Smallest representable block: header + two link words + footer.
pub const MIN_BLOCK_SIZE: usize = 16;

/// Bit 0 of a header/footer word: this block is allocated.
pub(crate) const ALLOC_BIT: u32 = 0x1;

/// Bit 1 of a header/footer word: the preceding block is allocated.
pub(crate) const PREV_ALLOC_BIT: u32 = 0x2;

/// Runtime-overridable allocator tuning, layered over the compile-time
/// constants above.
///
/// The only knob exposed today is the heap-extension granularity. Shrinking
/// it lets tests reach the extension path without staging multi-kilobyte
/// requests; production use should keep the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Bytes requested per heap extension when no existing free block fits.
    pub chunk_size: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNKSIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_chunksize_constant() {
        assert_eq!(AllocatorConfig::default().chunk_size, CHUNKSIZE);
    }
}
