use std::cmp::Ordering;

use crate::access::{alloc_vec, reverse, AllocPolicy, Elements, Typed};
use crate::error::SortError;
use crate::insertion::binary_insertion_sort;
use crate::merge::{merge, MergeState};
use crate::runs::{find_streak, minrun, provide_sorted_batch, RunStack, TimSortRun, MIN_MERGE};
use crate::tracking::{self, Event};

/// Sorts the slice, preserving the initial order of equal elements.
///
/// Runs in O(n) comparisons for presorted input and O(n log n) in the worst case. Allocates
/// half the length of `v` as scratch space, aborting if that fails.
#[inline]
pub fn sort<T>(v: &mut [T])
where
    T: Ord,
{
    sort_by(v, |a, b| a.cmp(b));
}

/// Sorts the slice with a comparator function, preserving the initial order of equal elements.
///
/// If `compare` does not implement a total order the resulting order is unspecified, but every
/// element is retained. If `compare` panics, the panic is propagated and `v` holds a permutation
/// of its original elements.
#[inline]
pub fn sort_by<T, F>(v: &mut [T], compare: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    if let Err(err) = stable_sort(v, compare, AllocPolicy::Abort) {
        // Aborting allocation can't report failure.
        unreachable!("{err}");
    }
}

/// Sorts the slice with a key extraction function, preserving the initial order of equal
/// elements. The key function is called twice per comparison.
#[inline]
pub fn sort_by_key<T, K, F>(v: &mut [T], mut f: F)
where
    F: FnMut(&T) -> K,
    K: Ord,
{
    sort_by(v, |a, b| f(a).cmp(&f(b)));
}

/// Like [`sort`], but returns [`SortError::AllocationFailed`] if the scratch space can't be
/// allocated. `v` is left untouched in that case.
#[inline]
pub fn try_sort<T>(v: &mut [T]) -> Result<(), SortError>
where
    T: Ord,
{
    try_sort_by(v, |a, b| a.cmp(b))
}

/// Like [`sort_by`], but returns [`SortError::AllocationFailed`] if the scratch space can't be
/// allocated. `v` is left untouched in that case.
#[inline]
pub fn try_sort_by<T, F>(v: &mut [T], compare: F) -> Result<(), SortError>
where
    F: FnMut(&T, &T) -> Ordering,
{
    stable_sort(v, compare, AllocPolicy::Fallible)
}

////////////////////////////////////////////////////////////////////////////////
// Sorting
////////////////////////////////////////////////////////////////////////////////

#[inline]
fn stable_sort<T, F>(v: &mut [T], mut compare: F, policy: AllocPolicy) -> Result<(), SortError>
where
    F: FnMut(&T, &T) -> Ordering,
{
    let Some(mut elems) = Typed::new(|a: &T, b: &T| compare(a, b) == Ordering::Less) else {
        // Sorting has no meaningful behavior on zero-sized types. Do nothing.
        return Ok(());
    };

    // SAFETY: `v` is an exclusively borrowed slice of `T`s, exactly what `Typed` describes.
    unsafe { merge_sort(v.as_mut_ptr().cast(), v.len(), &mut elems, policy) }
}

/// Sorts the `len` elements at `v`.
///
/// # Safety
///
/// `v` must be valid for reads and writes of `len` elements laid out as `elems` describes, and
/// must not be accessed through anything else for the duration of the call.
#[cfg_attr(feature = "no_inline_sub_functions", inline(never))]
pub(crate) unsafe fn merge_sort<E: Elements>(
    v: *mut u8,
    len: usize,
    elems: &mut E,
    policy: AllocPolicy,
) -> Result<(), SortError> {
    let size = elems.elem_size();

    if len < 2 {
        // These inputs are always sorted.
        return Ok(());
    }

    // SAFETY: The caller guarantees `v` holds `len` elements.
    let (mut end, mut was_reversed) = unsafe { find_streak(v, len, elems) };

    if end == len || len < MIN_MERGE {
        // Short inputs skip the run machinery, the first streak is their sorted prefix.
        // SAFETY: `end <= len`.
        unsafe {
            if was_reversed {
                reverse(v, end, size);
            }

            binary_insertion_sort(v, len, end, elems);
        }
        return Ok(());
    }

    let min_run = minrun(len);

    // Both allocations happen before the first element is moved, so a failure leaves `v` as it
    // was. Any two adjacent runs together are at most `len` long, the shorter one fits into
    // `len / 2`.
    let mut buf = elems.alloc_scratch(policy, len / 2)?;
    let buf_ptr = E::scratch_ptr(&mut buf);
    let mut runs = RunStack::new(alloc_vec(policy, len / min_run + 1)?);

    let mut state = MergeState::new();
    let mut start = 0;

    loop {
        // SAFETY: `start < end <= len`, the run and the padding stay within `v`.
        unsafe {
            if was_reversed {
                reverse(v.add(start * size), end - start, size);
            }

            end = provide_sorted_batch(v, len, start, end, min_run, elems);
        }

        runs.push(TimSortRun {
            start,
            len: end - start,
        });
        start = end;

        // Merge some pairs of adjacent runs to satisfy the invariants.
        while let Some(r) = runs.collapse() {
            // SAFETY: The runs on the stack tile `v[..start]` and `buf_ptr` holds `len / 2`.
            unsafe { merge_at(v, &mut runs, r, buf_ptr, &mut state, elems) };
        }

        if start == len {
            break;
        }

        // SAFETY: `start < len`.
        let (streak_len, streak_reversed) =
            unsafe { find_streak(v.add(start * size), len - start, elems) };
        end = start + streak_len;
        was_reversed = streak_reversed;
    }

    if runs.len() > 1 {
        tracking::record(Event::Collapse { runs: runs.len() });
    }

    while let Some(r) = runs.force_collapse() {
        // SAFETY: As above.
        unsafe { merge_at(v, &mut runs, r, buf_ptr, &mut state, elems) };
    }

    // Finally, exactly one run must remain in the stack.
    debug_assert!(runs.as_slice() == [TimSortRun { start: 0, len }]);

    Ok(())
}

/// Merges `runs[r]` and `runs[r + 1]`.
///
/// # Safety
///
/// Both runs must lie within the elements at `v`, and `buf` must have room for the shorter one.
unsafe fn merge_at<E: Elements>(
    v: *mut u8,
    runs: &mut RunStack,
    r: usize,
    buf: *mut u8,
    state: &mut MergeState,
    elems: &mut E,
) {
    let left = runs.as_slice()[r];
    let right = runs.as_slice()[r + 1];

    tracking::record(Event::Merge {
        start: left.start,
        left_len: left.len,
        right_len: right.len,
    });

    // SAFETY: Both runs are non-empty and adjacent, the caller guarantees they are in bounds and
    // that `buf` fits the shorter one. `buf` is a separate allocation.
    unsafe {
        merge(
            v.add(left.start * elems.elem_size()),
            left.len + right.len,
            left.len,
            buf,
            state,
            elems,
        );
    }

    runs.merged(r);
}
