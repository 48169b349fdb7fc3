/// Splits `items` into consecutive sub-slices of at most `size` elements,
/// preserving order.
///
/// # Panics
/// Panics if `size` is zero. Chunk sizes come from validated configuration.
pub fn chunk<T>(items: &[T], size: usize) -> Vec<&[T]> {
    assert!(size > 0, "chunk size must be positive");
    items.chunks(size).collect()
}
