use std::ptr;

use crate::access::Elements;
use crate::search::{gallop, gallop_rev, locate};
use crate::tracking::{self, Event};

/// Initial number of consecutive wins of one run before a merge switches to galloping.
pub const MIN_GALLOP: usize = 7;

/// Galloping state, carried from one merge to the next within one sort call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeState {
    /// Streak length needed to enter galloping mode. Adapts to how well galloping has been
    /// paying off, never drops below 1.
    pub min_gallop: usize,
    pub galloping: bool,
}

impl MergeState {
    pub fn new() -> Self {
        Self {
            min_gallop: MIN_GALLOP,
            galloping: false,
        }
    }

    fn enter_gallop(&mut self) {
        self.galloping = true;
        tracking::record(Event::GallopEnter {
            min_gallop: self.min_gallop,
        });
    }

    /// Rates one round of galloping, where `count_a` and `count_b` elements were skipped over in
    /// the two runs. Returns whether to keep galloping.
    fn gallop_round(&mut self, count_a: usize, count_b: usize) -> bool {
        if count_a < self.min_gallop || count_b < self.min_gallop {
            self.min_gallop += 1;
            self.galloping = false;
            tracking::record(Event::GallopExit {
                min_gallop: self.min_gallop,
            });
            false
        } else {
            self.min_gallop = (self.min_gallop - 1).max(1);
            true
        }
    }
}

impl Default for MergeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges the non-decreasing runs `v[..mid]` and `v[mid..len]` using `buf` as temporary
/// storage, and stores the result into `v[..len]`.
///
/// The left elements not greater than `v[mid]` and the right elements not less than `v[mid - 1]`
/// are already in their final place. Only the part in between is merged, from the front if its
/// left run is the shorter one, from the back otherwise.
///
/// # Safety
///
/// `mid` must be in `1..len` and `v` valid for reads and writes of `len` elements laid out as
/// `elems` describes. Buffer `buf` must be valid for writes of `min(mid, len - mid)` elements and
/// must not overlap `v`.
#[cfg_attr(feature = "no_inline_sub_functions", inline(never))]
pub unsafe fn merge<E: Elements>(
    v: *mut u8,
    len: usize,
    mid: usize,
    buf: *mut u8,
    state: &mut MergeState,
    elems: &mut E,
) {
    assert!(mid > 0 && mid < len);

    let size = elems.elem_size();

    // SAFETY: All probed indices are below `len`.
    let (lo, hi) = unsafe {
        let first_right = v.add(mid * size);
        let lo = locate(0, mid, &mut |i| !elems.is_less(first_right, v.add(i * size)));
        if lo == mid {
            // Already in order.
            return;
        }

        let last_left = v.add((mid - 1) * size);
        let hi = locate(mid, len, &mut |i| elems.is_less(v.add(i * size), last_left));

        (lo, hi)
    };

    if hi == mid {
        // Only reachable with a comparator that contradicts itself.
        return;
    }

    // SAFETY: `lo < mid < hi <= len`, both sides are non-empty and the shorter one fits into
    // `buf`, the caller guarantees `buf` holds the shorter of the untrimmed runs.
    unsafe {
        let v = v.add(lo * size);
        let (len, mid) = (hi - lo, mid - lo);

        if mid <= len - mid {
            merge_lo(v, len, mid, buf, state, elems);
        } else {
            merge_hi(v, len, mid, buf, state, elems);
        }
    }
}

/// Merges from the front with the left run copied into `buf`.
///
/// # Safety
///
/// Same as [`merge`], with `buf` valid for `mid` elements.
unsafe fn merge_lo<E: Elements>(
    v: *mut u8,
    len: usize,
    mid: usize,
    buf: *mut u8,
    state: &mut MergeState,
    elems: &mut E,
) {
    let size = elems.elem_size();

    // Intermediate state of the process is always tracked by `hole`, which serves two purposes:
    // 1. Protects integrity of `v` from panics in `is_less`.
    // 2. Fills the remaining hole in `v` if the right run gets consumed first.
    //
    // The unconsumed left elements `hole.start..hole.end` always fit exactly into
    // `hole.dest..right`. All pointers step by `size` bytes, one element at a time.
    //
    // Panic safety:
    //
    // If `is_less` panics at any point during the process, `hole` will get dropped and fill the
    // hole in `v` with the unconsumed range in `buf`, thus ensuring that `v` still holds every
    // object it initially held exactly once.
    //
    // SAFETY: The caller guarantees `buf` can hold `mid` elements and all pointers below stay
    // within `v[..len]` and `buf[..mid]`, as checked by the loop conditions.
    unsafe {
        ptr::copy_nonoverlapping(v, buf, mid * size);
        let mut hole = MergeHole {
            start: buf,
            end: buf.add(mid * size),
            dest: v,
        };

        let mut right = v.add(mid * size);
        let right_end = v.add(len * size);

        'merge: loop {
            if !state.galloping {
                let mut left_wins = 0;
                let mut right_wins = 0;

                // Consume the lesser side.
                // If equal, prefer the left run to maintain stability.
                loop {
                    if elems.is_less(right, hole.start) {
                        ptr::copy_nonoverlapping(right, hole.dest, size);
                        hole.dest = hole.dest.add(size);
                        right = right.add(size);

                        right_wins += 1;
                        left_wins = 0;

                        if right == right_end {
                            break 'merge;
                        }
                        if right_wins >= state.min_gallop {
                            break;
                        }
                    } else {
                        ptr::copy_nonoverlapping(hole.start, hole.dest, size);
                        hole.dest = hole.dest.add(size);
                        hole.start = hole.start.add(size);

                        left_wins += 1;
                        right_wins = 0;

                        if hole.start == hole.end {
                            break 'merge;
                        }
                        if left_wins >= state.min_gallop {
                            break;
                        }
                    }
                }

                state.enter_gallop();
            }

            loop {
                // Left elements not greater than the next right element go first.
                let left = hole.start;
                let left_len = hole.len() / size;
                let left_count =
                    gallop(left_len, &mut |i| !elems.is_less(right, left.add(i * size)));

                ptr::copy_nonoverlapping(hole.start, hole.dest, left_count * size);
                hole.dest = hole.dest.add(left_count * size);
                hole.start = hole.start.add(left_count * size);
                if hole.start == hole.end {
                    break 'merge;
                }

                ptr::copy_nonoverlapping(right, hole.dest, size);
                hole.dest = hole.dest.add(size);
                right = right.add(size);
                if right == right_end {
                    break 'merge;
                }

                // Right elements less than the next left element go first.
                let key = hole.start;
                let right_len = right_end.offset_from(right) as usize / size;
                let right_count =
                    gallop(right_len, &mut |i| elems.is_less(right.add(i * size), key));

                // Source and destination are both in `v` and may overlap.
                ptr::copy(right, hole.dest, right_count * size);
                hole.dest = hole.dest.add(right_count * size);
                right = right.add(right_count * size);
                if right == right_end {
                    break 'merge;
                }

                ptr::copy_nonoverlapping(hole.start, hole.dest, size);
                hole.dest = hole.dest.add(size);
                hole.start = hole.start.add(size);
                if hole.start == hole.end {
                    break 'merge;
                }

                if !state.gallop_round(left_count, right_count) {
                    break;
                }
            }
        }

        // Finally, `hole` gets dropped. If the left run was not fully consumed, whatever remains
        // of it will now be copied into the hole in `v`.
    }
}

/// Merges from the back with the right run copied into `buf`.
///
/// # Safety
///
/// Same as [`merge`], with `buf` valid for `len - mid` elements.
unsafe fn merge_hi<E: Elements>(
    v: *mut u8,
    len: usize,
    mid: usize,
    buf: *mut u8,
    state: &mut MergeState,
    elems: &mut E,
) {
    let size = elems.elem_size();

    // Same as in `merge_lo`, only mirrored. `hole.dest` is the end of the unconsumed left run and
    // the unconsumed right elements `hole.start..hole.end` always fit exactly into
    // `hole.dest..out`.
    //
    // SAFETY: The caller guarantees `buf` can hold `len - mid` elements and all pointers below
    // stay within `v[..len]` and `buf[..len - mid]`, as checked by the loop conditions.
    unsafe {
        ptr::copy_nonoverlapping(v.add(mid * size), buf, (len - mid) * size);
        let mut hole = MergeHole {
            start: buf,
            end: buf.add((len - mid) * size),
            dest: v.add(mid * size),
        };

        // Initially, this pointer points past the end of `v`.
        let mut out = v.add(len * size);

        'merge: loop {
            if !state.galloping {
                let mut left_wins = 0;
                let mut right_wins = 0;

                // Consume the greater side.
                // If equal, prefer the right run to maintain stability.
                loop {
                    if elems.is_less(hole.end.sub(size), hole.dest.sub(size)) {
                        hole.dest = hole.dest.sub(size);
                        out = out.sub(size);
                        ptr::copy_nonoverlapping(hole.dest, out, size);

                        left_wins += 1;
                        right_wins = 0;

                        if hole.dest == v {
                            break 'merge;
                        }
                        if left_wins >= state.min_gallop {
                            break;
                        }
                    } else {
                        hole.end = hole.end.sub(size);
                        out = out.sub(size);
                        ptr::copy_nonoverlapping(hole.end, out, size);

                        right_wins += 1;
                        left_wins = 0;

                        if hole.end == hole.start {
                            break 'merge;
                        }
                        if right_wins >= state.min_gallop {
                            break;
                        }
                    }
                }

                state.enter_gallop();
            }

            loop {
                // Left elements greater than the last right element go last.
                let key = hole.end.sub(size);
                let left_len = hole.dest.offset_from(v) as usize / size;
                let left_count = left_len
                    - gallop_rev(left_len, &mut |i| !elems.is_less(key, v.add(i * size)));

                // Source and destination are both in `v` and may overlap.
                hole.dest = hole.dest.sub(left_count * size);
                out = out.sub(left_count * size);
                ptr::copy(hole.dest, out, left_count * size);
                if hole.dest == v {
                    break 'merge;
                }

                hole.end = hole.end.sub(size);
                out = out.sub(size);
                ptr::copy_nonoverlapping(hole.end, out, size);
                if hole.end == hole.start {
                    break 'merge;
                }

                // Right elements not less than the last left element go last.
                let key = hole.dest.sub(size);
                let right = hole.start;
                let right_len = hole.len() / size;
                let right_count = right_len
                    - gallop_rev(right_len, &mut |i| elems.is_less(right.add(i * size), key));

                hole.end = hole.end.sub(right_count * size);
                out = out.sub(right_count * size);
                ptr::copy_nonoverlapping(hole.end, out, right_count * size);
                if hole.end == hole.start {
                    break 'merge;
                }

                hole.dest = hole.dest.sub(size);
                out = out.sub(size);
                ptr::copy_nonoverlapping(hole.dest, out, size);
                if hole.dest == v {
                    break 'merge;
                }

                if !state.gallop_round(left_count, right_count) {
                    break;
                }
            }
        }

        // Finally, `hole` gets dropped. If the right run was not fully consumed, whatever remains
        // of it will now be copied into the hole in `v`.
    }
}

// When dropped, copies the bytes `start..end` into `dest..`.
struct MergeHole {
    start: *mut u8,
    end: *mut u8,
    dest: *mut u8,
}

impl MergeHole {
    /// Unconsumed bytes.
    #[inline]
    fn len(&self) -> usize {
        // SAFETY: Both point into the same scratch buffer, `start <= end`.
        unsafe { self.end.offset_from(self.start) as usize }
    }
}

impl Drop for MergeHole {
    fn drop(&mut self) {
        // SAFETY: `start..end` holds whole elements copied out of the merged slice, and exactly
        // that many bytes are missing at `dest`.
        unsafe {
            ptr::copy_nonoverlapping(self.start, self.dest, self.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::access::{Opaque, Typed};

    fn merge_vec<T>(
        v: &mut [T],
        mid: usize,
        state: &mut MergeState,
        is_less: &mut impl FnMut(&T, &T) -> bool,
    ) {
        let mut elems = Typed::new(is_less).unwrap();
        let mut buf: Vec<T> = Vec::with_capacity(v.len() / 2 + 1);
        // SAFETY: buf has room for the shorter run and doesn't overlap v.
        unsafe {
            merge(
                v.as_mut_ptr().cast(),
                v.len(),
                mid,
                buf.as_mut_ptr().cast(),
                state,
                &mut elems,
            );
        }
    }

    #[test]
    fn merges_both_directions() {
        let mut lt = |a: &i32, b: &i32| a < b;
        let mut state = MergeState::new();

        // Left shorter, merge from the front.
        let mut v = vec![2, 5, 8, 0, 1, 3, 4, 6, 7, 9];
        merge_vec(&mut v, 3, &mut state, &mut lt);
        assert_eq!(v, (0..10).collect::<Vec<_>>());

        // Right shorter, merge from the back.
        let mut v = vec![0, 1, 3, 4, 6, 7, 9, 2, 5, 8];
        merge_vec(&mut v, 7, &mut state, &mut lt);
        assert_eq!(v, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn already_ordered_runs_are_untouched() {
        let mut comparisons = 0;
        let mut v: Vec<i32> = (0..100).collect();
        merge_vec(&mut v, 40, &mut MergeState::new(), &mut |a, b| {
            comparisons += 1;
            a < b
        });

        assert_eq!(v, (0..100).collect::<Vec<_>>());
        assert!(comparisons <= 7, "{comparisons} comparisons");
    }

    #[test]
    fn stable_in_both_directions() {
        for mid in [20, 60] {
            let mut v: Vec<(i32, usize)> = (0..mid)
                .map(|i| (i as i32 / 4, i))
                .chain((mid..80).map(|i| ((i - mid) as i32 / 3, i)))
                .collect();

            merge_vec(&mut v, mid, &mut MergeState::new(), &mut |a, b| a.0 < b.0);

            assert!(v.windows(2).all(|w| w[0] <= w[1]), "mid {mid}: {v:?}");
        }
    }

    #[test]
    fn gallops_over_long_streaks() {
        // Blocks of 50 alternate between the runs.
        let left: Vec<i32> = (0..500).filter(|x| (x / 50) % 2 == 0).collect();
        let right: Vec<i32> = (0..500).filter(|x| (x / 50) % 2 == 1).collect();

        for (a, b) in [(&left, &right), (&right, &left)] {
            let mut v: Vec<i32> = a.iter().chain(b.iter()).copied().collect();
            let mid = a.len();

            let mut state = MergeState::new();
            let mut comparisons = 0;
            merge_vec(&mut v, mid, &mut state, &mut |a, b| {
                comparisons += 1;
                a < b
            });

            assert_eq!(v, (0..500).collect::<Vec<_>>());
            assert!(comparisons < 250, "{comparisons} comparisons");
            assert!(state.min_gallop < MIN_GALLOP);
        }
    }

    #[test]
    fn merges_records_in_place() {
        // Left shorter and right shorter after trimming.
        let cases: [(&[u8], usize); 2] = [
            (&[1, 4, 4, 6, 9, 0, 4, 4, 5, 7, 8, 9], 5),
            (&[0, 2, 3, 3, 5, 6, 8, 9, 3, 4, 7, 9], 8),
        ];

        for (keys, mid) in cases {
            // 5 byte records keyed by their first byte, the second one tags the original position.
            let mut bytes: Vec<u8> = keys
                .iter()
                .enumerate()
                .flat_map(|(i, &k)| [k, i as u8, 0xAA, 0xBB, 0xCC])
                .collect();

            let mut expected: Vec<&[u8]> = bytes.chunks_exact(5).collect();
            expected.sort_by_key(|r| r[0]);
            let expected = expected.concat();

            let mut elems = Opaque::new(5, |a: &[u8], b: &[u8]| a[0].cmp(&b[0])).unwrap();
            let mut buf: Vec<u8> = Vec::with_capacity(6 * 5);
            // SAFETY: 12 records, `buf` holds 6 of them.
            unsafe {
                merge(
                    bytes.as_mut_ptr(),
                    12,
                    mid,
                    buf.as_mut_ptr(),
                    &mut MergeState::new(),
                    &mut elems,
                );
            }

            assert_eq!(bytes, expected, "mid {mid}");
        }
    }

    #[test]
    fn galloping_state_adapts() {
        let mut state = MergeState::new();
        state.enter_gallop();
        assert!(state.galloping);

        assert!(state.gallop_round(10, 10));
        assert_eq!(state.min_gallop, MIN_GALLOP - 1);

        assert!(!state.gallop_round(100, 0));
        assert_eq!(state.min_gallop, MIN_GALLOP);
        assert!(!state.galloping);

        state.min_gallop = 1;
        assert!(state.gallop_round(1, 1));
        assert_eq!(state.min_gallop, 1);
    }

    #[test]
    fn inconsistent_comparator_keeps_elements() {
        for mid in [1, 10, 30, 49] {
            let mut v: Vec<u32> = (0..mid as u32)
                .map(|x| x * 2)
                .chain((0..(50 - mid) as u32).map(|x| x * 2 + 1))
                .collect();

            let mut counter = 0u32;
            merge_vec(&mut v, mid, &mut MergeState::new(), &mut |_, _| {
                counter = counter.wrapping_mul(1103515245).wrapping_add(12345);
                (counter >> 16) & 1 == 1
            });

            v.sort_unstable();
            let mut expected: Vec<u32> = (0..mid as u32)
                .map(|x| x * 2)
                .chain((0..(50 - mid) as u32).map(|x| x * 2 + 1))
                .collect();
            expected.sort_unstable();
            assert_eq!(v, expected);
        }
    }
}
