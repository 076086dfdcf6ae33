//! Sorted-slice set helpers used by the intersection pass.

use itertools::{EitherOrBoth, Itertools};

/// True when every element of `sub` occurs in `sup`. Both slices sorted.
pub fn includes<T: Ord>(sup: &[T], sub: &[T]) -> bool {
    sup.iter()
        .merge_join_by(sub.iter(), |a, b| a.cmp(b))
        .all(|pair| !matches!(pair, EitherOrBoth::Right(_)))
}

/// Smallest element shared by two sorted slices.
pub fn first_common<'a, T: Ord>(a: &'a [T], b: &[T]) -> Option<&'a T> {
    a.iter()
        .merge_join_by(b.iter(), |x, y| x.cmp(y))
        .find_map(|pair| match pair {
            EitherOrBoth::Both(x, _) => Some(x),
            _ => None,
        })
}

/// True when the sorted slices share at least one element.
pub fn intersects<T: Ord>(a: &[T], b: &[T]) -> bool {
    first_common(a, b).is_some()
}
