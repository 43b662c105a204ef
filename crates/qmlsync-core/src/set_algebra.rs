//! Merge-join routines over pre-sorted sequences.
//!
//! Every routine walks both inputs once. Both inputs MUST already be sorted by
//! the ordering `compare` implements; unsorted input gives an unspecified
//! (but memory safe) result. Callers sort, these functions never do.

use std::cmp::Ordering;

/// Calls `visit` for every element of `first` that has an equal element in
/// `second`, in ascending order.
///
/// Greedy: several consecutive elements of `first` can match the same element
/// of `second`, e.g. all cache entries of one directory against a single
/// directory id.
pub fn set_greedy_intersection<A, B, C, V>(
    first: impl IntoIterator<Item = A>,
    second: impl IntoIterator<Item = B>,
    mut compare: C,
    mut visit: V,
) where
    C: FnMut(&A, &B) -> Ordering,
    V: FnMut(A),
{
    let mut first = first.into_iter();
    let mut second = second.into_iter();
    let mut next_first = first.next();
    let mut next_second = second.next();

    while let Some(a) = next_first.take() {
        let Some(b) = next_second.as_ref() else {
            break;
        };

        match compare(&a, b) {
            Ordering::Less => next_first = first.next(),
            Ordering::Greater => {
                next_first = Some(a);
                next_second = second.next();
            }
            Ordering::Equal => {
                visit(a);
                next_first = first.next();
            }
        }
    }
}

/// Calls `visit` for every element of `first` without an equal element in
/// `second`, in ascending order.
pub fn set_greedy_difference<A, B, C, V>(
    first: impl IntoIterator<Item = A>,
    second: impl IntoIterator<Item = B>,
    mut compare: C,
    mut visit: V,
) where
    C: FnMut(&A, &B) -> Ordering,
    V: FnMut(A),
{
    let mut first = first.into_iter();
    let mut second = second.into_iter();
    let mut next_first = first.next();
    let mut next_second = second.next();

    while let Some(a) = next_first.take() {
        let Some(b) = next_second.as_ref() else {
            visit(a);
            first.by_ref().for_each(&mut visit);
            break;
        };

        match compare(&a, b) {
            Ordering::Less => {
                visit(a);
                next_first = first.next();
            }
            Ordering::Greater => {
                next_first = Some(a);
                next_second = second.next();
            }
            Ordering::Equal => next_first = first.next(),
        }
    }
}

/// Merges two sorted sequences into one sorted sequence. When both sides hold
/// an equal element the one from `first` is kept.
pub fn set_union<T, C>(first: Vec<T>, second: Vec<T>, mut compare: C) -> Vec<T>
where
    C: FnMut(&T, &T) -> Ordering,
{
    let mut merged = Vec::with_capacity(first.len() + second.len());
    let mut first = first.into_iter().peekable();
    let mut second = second.into_iter().peekable();

    loop {
        let ordering = match (first.peek(), second.peek()) {
            (Some(a), Some(b)) => compare(a, b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };

        match ordering {
            Ordering::Less => merged.extend(first.next()),
            Ordering::Greater => merged.extend(second.next()),
            Ordering::Equal => {
                merged.extend(first.next());
                second.next();
            }
        }
    }

    merged
}

/// Sorted `first` without the elements present in sorted `second`.
pub fn set_difference<T: Ord>(first: Vec<T>, second: &[T]) -> Vec<T> {
    let mut difference = Vec::with_capacity(first.len());
    set_greedy_difference(first, second, |a, b| a.cmp(*b), |a| difference.push(a));
    difference
}

/// Sorts and removes duplicates in place.
pub fn sort_unique<T: Ord>(values: &mut Vec<T>) {
    values.sort_unstable();
    values.dedup();
}
