//! Slice projection for batch operations.

/// Clone the elements of `items` at `indices`, in the order of `indices`.
///
/// Batch operations receive positions into the caller's key list; this maps
/// them back to the caller's own arguments:
///
/// ```
/// use opcache_core::select_by_indices;
///
/// let xs = [10, 20, 30, 40];
/// assert_eq!(select_by_indices(&xs, &[3, 1]), vec![40, 20]);
/// ```
///
/// # Panics
///
/// Panics if an index is out of bounds, like slice indexing.
pub fn select_by_indices<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| items[i].clone()).collect()
}
