use std::cmp;

use crate::access::Elements;
use crate::insertion::binary_insertion_sort;
use crate::tracking::{self, Event};

/// Inputs shorter than this are sorted with binary insertion sort alone. It's also the upper
/// bound of the minimum run length for everything else.
pub const MIN_MERGE: usize = 64;

/// Internal type used by merge_sort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimSortRun {
    pub start: usize,
    pub len: usize,
}

impl TimSortRun {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Minimum run length for a slice of `len` elements.
///
/// Below [`MIN_MERGE`] that's `len` itself. Otherwise `len` is shifted right until only its top 6
/// bits remain, plus one if any of the shifted out bits was set. The result is in `32..=64` and
/// `len / minrun` is at most, and usually close to, a power of two. Splitting into a power of two
/// number of equally sized runs is what keeps the final merges balanced.
pub fn minrun(len: usize) -> usize {
    let mut n = len;
    let mut r = 0;

    while n >= MIN_MERGE {
        r |= n & 1;
        n >>= 1;
    }

    n + r
}

/// Finds a streak of presorted elements starting at `v`. Returns the number of elements in the
/// streak, and a bool denoting whether the streak was reversed. Streaks can be non-decreasing or
/// strictly decreasing.
///
/// Equal neighbours never end a non-decreasing streak and always end a decreasing one. Reversing
/// a strictly decreasing streak can't reorder equal elements, there are none.
///
/// # Safety
///
/// `v` must be valid for reads of `len` elements laid out as `elems` describes.
pub unsafe fn find_streak<E: Elements>(
    v: *const u8,
    len: usize,
    elems: &mut E,
) -> (usize, bool) {
    let size = elems.elem_size();

    if len < 2 {
        return (len, false);
    }

    let mut end = 2;

    // SAFETY: Every index below is less than `len`.
    unsafe {
        let at = |i: usize| v.add(i * size);

        let assume_reverse = elems.is_less(at(1), at(0));

        if assume_reverse {
            while end < len && elems.is_less(at(end), at(end - 1)) {
                end += 1;
            }

            (end, true)
        } else {
            while end < len && !elems.is_less(at(end), at(end - 1)) {
                end += 1;
            }

            (end, false)
        }
    }
}

/// Takes the sorted run `v[start..end]` and extends it to `min_run` elements, or to `len` if fewer
/// are left, by binary insertion sorting the elements behind it. Returns the new end of the run.
///
/// # Safety
///
/// `v` must be valid for reads and writes of `len` elements laid out as `elems` describes.
#[cfg_attr(feature = "no_inline_sub_functions", inline(never))]
pub unsafe fn provide_sorted_batch<E: Elements>(
    v: *mut u8,
    len: usize,
    start: usize,
    end: usize,
    min_run: usize,
    elems: &mut E,
) -> usize {
    debug_assert!(end > start && end <= len);

    let target = cmp::min(start + min_run, len);

    if end < target {
        // SAFETY: `start..target` is within `0..len`.
        unsafe {
            binary_insertion_sort(
                v.add(start * elems.elem_size()),
                target - start,
                end - start,
                elems,
            );
        }
        target
    } else {
        end
    }
}

/// Runs that were found but not yet merged, in slice order.
///
/// For the top runs `A`, `B`, `C` (`C` pushed last) the maintained invariants are
/// `len(A) > len(B) + len(C)` and `len(B) > len(C)`, so the run lengths grow at least as fast as
/// the Fibonacci numbers towards the bottom of the stack.
pub struct RunStack {
    runs: Vec<TimSortRun>,
}

impl RunStack {
    /// `runs` must be empty. Its capacity should be `len / min_run + 1`, enough for every run of a
    /// slice of `len` elements to be pushed without reallocating.
    pub fn new(runs: Vec<TimSortRun>) -> Self {
        debug_assert!(runs.is_empty());
        Self { runs }
    }

    pub fn push(&mut self, run: TimSortRun) {
        debug_assert!(run.len > 0);
        debug_assert!(self.runs.last().map_or(run.start == 0, |top| top.end() == run.start));

        tracking::record(Event::RunPushed {
            start: run.start,
            len: run.len,
        });
        self.runs.push(run);
    }

    pub fn as_slice(&self) -> &[TimSortRun] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Examines the stack of runs and identifies the next pair of runs to merge. More
    /// specifically, if `Some(r)` is returned, that means `runs[r]` and `runs[r + 1]` must be
    /// merged next. If the invariants hold `None` is returned and the next run can be pushed.
    ///
    /// Besides the top three runs the fourth one is checked as well. Merging `B` and `C` can break
    /// `len(X) > len(A) + len(B + C)` for the run `X` below `A`, which would go unnoticed when only
    /// looking at the top three.
    pub fn collapse(&self) -> Option<usize> {
        let runs = &self.runs;
        let n = runs.len();

        if n >= 2
            && (runs[n - 2].len <= runs[n - 1].len
                || (n >= 3 && runs[n - 3].len <= runs[n - 2].len + runs[n - 1].len)
                || (n >= 4 && runs[n - 4].len <= runs[n - 3].len + runs[n - 2].len))
        {
            if n >= 3 && runs[n - 3].len < runs[n - 1].len {
                Some(n - 3)
            } else {
                Some(n - 2)
            }
        } else {
            None
        }
    }

    /// Once all runs are pushed, the two topmost runs are merged until one is left.
    pub fn force_collapse(&self) -> Option<usize> {
        let n = self.runs.len();

        if n >= 2 {
            Some(n - 2)
        } else {
            None
        }
    }

    /// Replaces `runs[r]` and `runs[r + 1]` with the run covering both.
    pub fn merged(&mut self, r: usize) {
        let left = self.runs[r];
        let right = self.runs[r + 1];
        debug_assert_eq!(left.end(), right.start);

        self.runs[r] = TimSortRun {
            start: left.start,
            len: left.len + right.len,
        };
        self.runs.remove(r + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::access::{Opaque, Typed};

    #[test]
    fn minrun_small_is_identity() {
        for n in 0..MIN_MERGE {
            assert_eq!(minrun(n), n);
        }
    }

    #[test]
    fn minrun_bounds() {
        for n in (MIN_MERGE..100_000).chain([1 << 20, (1 << 20) + 1, 5_000_000, usize::MAX]) {
            let m = minrun(n);
            assert!((32..=64).contains(&m), "minrun({n}) == {m}");

            // The number of shifted out bits.
            let shift = usize::BITS - n.leading_zeros() - 6;
            let runs = n / m + (n % m != 0) as usize;
            assert!(runs as u128 <= 1u128 << shift, "n {n} minrun {m} runs {runs}");
        }

        assert_eq!(minrun(64), 32);
        assert_eq!(minrun(65), 33);
        assert_eq!(minrun(127), 64);
        assert_eq!(minrun(128), 32);
        assert_eq!(minrun(2112), 33);
    }

    fn streak<T>(v: &[T], is_less: impl FnMut(&T, &T) -> bool) -> (usize, bool) {
        let mut elems = Typed::new(is_less).unwrap();
        // SAFETY: `v` is a valid slice of `T`.
        unsafe { find_streak(v.as_ptr().cast(), v.len(), &mut elems) }
    }

    fn sorted_batch(v: &mut [i32], start: usize, end: usize, min_run: usize) -> usize {
        let mut elems = Typed::new(|a: &i32, b: &i32| a < b).unwrap();
        // SAFETY: `v` is a valid slice of `i32`.
        unsafe {
            provide_sorted_batch(v.as_mut_ptr().cast(), v.len(), start, end, min_run, &mut elems)
        }
    }

    #[test]
    fn streaks() {
        let lt = |a: &i32, b: &i32| a < b;

        assert_eq!(streak(&[], lt), (0, false));
        assert_eq!(streak(&[4], lt), (1, false));
        assert_eq!(streak(&[1, 1, 2, 2, 0], lt), (4, false));
        assert_eq!(streak(&[5, 4, 3, 3, 2], lt), (3, true));
        assert_eq!(streak(&[3, 3, 2], lt), (2, false));
        assert_eq!(streak(&[9, 8, 7, 6], lt), (4, true));
    }

    #[test]
    fn record_streaks() {
        // Two byte records, compared by their second byte only.
        let bytes = [9u8, 1, 0, 1, 7, 2, 5, 0];
        let mut elems = Opaque::new(2, |a: &[u8], b: &[u8]| a[1].cmp(&b[1])).unwrap();

        // SAFETY: 4 records of 2 bytes.
        assert_eq!(unsafe { find_streak(bytes.as_ptr(), 4, &mut elems) }, (3, false));
        // SAFETY: The last 2 records.
        assert_eq!(unsafe { find_streak(bytes.as_ptr().add(4), 2, &mut elems) }, (2, true));
    }

    #[test]
    fn sorted_batch_pads_short_runs() {
        let mut v = [1, 2, 9, 3, 0, 7, 5];
        assert_eq!(sorted_batch(&mut v, 0, 3, 5), 5);
        assert_eq!(v, [0, 1, 2, 3, 9, 7, 5]);

        // Clamped to the end of the slice.
        assert_eq!(sorted_batch(&mut v, 5, 6, 5), 7);
        assert_eq!(&v[5..], [5, 7]);

        // Long enough already.
        let mut w = [1, 2, 3, 4, 0];
        assert_eq!(sorted_batch(&mut w, 0, 4, 3), 4);
        assert_eq!(w, [1, 2, 3, 4, 0]);
    }

    fn stack_of(lens: &[usize]) -> RunStack {
        let mut stack = RunStack::new(Vec::with_capacity(lens.len()));
        let mut start = 0;
        for &len in lens {
            stack.runs.push(TimSortRun { start, len });
            start += len;
        }
        stack
    }

    #[test]
    fn collapse_picks_smaller_neighbour() {
        // Invariants hold.
        assert_eq!(stack_of(&[100]).collapse(), None);
        assert_eq!(stack_of(&[100, 40]).collapse(), None);
        assert_eq!(stack_of(&[100, 40, 30]).collapse(), None);

        // len(B) <= len(C) with two runs.
        assert_eq!(stack_of(&[40, 40]).collapse(), Some(0));

        // len(A) <= len(B) + len(C), A not shorter than C: merge B and C.
        assert_eq!(stack_of(&[60, 40, 30]).collapse(), Some(1));

        // A shorter than C: merge A and B.
        assert_eq!(stack_of(&[30, 20, 64]).collapse(), Some(0));

        // Only the fourth run from the top is out of balance.
        assert_eq!(stack_of(&[100, 60, 50, 5]).collapse(), Some(2));
    }

    #[test]
    fn merged_replaces_pair() {
        let mut stack = stack_of(&[30, 20, 64]);
        stack.merged(0);
        assert_eq!(
            stack.as_slice(),
            [
                TimSortRun { start: 0, len: 50 },
                TimSortRun { start: 50, len: 64 }
            ]
        );

        assert_eq!(stack.force_collapse(), Some(0));
        stack.merged(0);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.force_collapse(), None);
    }
}
