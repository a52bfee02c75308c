//! Balanced tree reduction.
//!
//! Folding a sequence pairwise along a balanced tree keeps the depth of the resulting circuit
//! logarithmic in the number of elements, which bounds the number of communication rounds of
//! interactive backends.

/// Reduces `items` with `combine` along a balanced tree.
///
/// Returns `None` for an empty slice.
pub fn reduce<T: Clone>(items: &[T], mut combine: impl FnMut(T, T) -> T) -> Option<T> {
    reduce_indexed(items, &mut combine, |item, _| item.clone())
}

/// Like [`reduce`], but every element is first mapped by `leaf`.
pub fn reduce_with<T, U>(
    items: &[T],
    combine: impl FnMut(U, U) -> U,
    mut leaf: impl FnMut(&T) -> U,
) -> Option<U> {
    reduce_indexed(items, combine, |item, _| leaf(item))
}

/// Like [`reduce_with`], but `leaf` also receives the element's position in `items`.
///
/// Splits happen at the midpoint and the left half is always reduced before the right half, so
/// `combine` and `leaf` observe the elements in order.
pub fn reduce_indexed<T, U>(
    items: &[T],
    mut combine: impl FnMut(U, U) -> U,
    mut leaf: impl FnMut(&T, usize) -> U,
) -> Option<U> {
    if items.is_empty() {
        return None;
    }
    Some(reduce_range(items, 0, &mut combine, &mut leaf))
}

fn reduce_range<T, U>(
    items: &[T],
    offset: usize,
    combine: &mut impl FnMut(U, U) -> U,
    leaf: &mut impl FnMut(&T, usize) -> U,
) -> U {
    if let [item] = items {
        return leaf(item, offset);
    }
    let mid = items.len() / 2;
    let (left, right) = items.split_at(mid);
    let left = reduce_range(left, offset, combine, leaf);
    let right = reduce_range(right, offset + mid, combine, leaf);
    combine(left, right)
}
