/// Rounds a size up to the nearest multiple of [`crate::config::ALIGNMENT`] (8 bytes).
///
/// This is the low-level rounding primitive; block-size canonicalisation
/// (which also accounts for the header word and the minimum block size)
/// lives in [`crate::heap::canonical_size`].
///
/// # Examples
///
/// ```rust
/// use seglloc::align8;
///
/// assert_eq!(align8!(1), 8);
/// assert_eq!(align8!(8), 8);
/// assert_eq!(align8!(9), 16);
/// ```
#[macro_export]
macro_rules! align8 {
  ($value:expr) => {
    (($value) + $crate::config::ALIGNMENT - 1) & !($crate::config::ALIGNMENT - 1)
  };
}
