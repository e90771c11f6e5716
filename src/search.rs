//! Locating elements in ascending ranges.
//!
//! All searches take a predicate on element indices that holds for a prefix of the range and not
//! for the rest, and return the end of that prefix. With `!is_less(key, e)` as predicate that's the
//! position after the last element not greater than the key, so a key that ties with existing
//! elements lands behind them. With `is_less(e, key)` it's the position in front of the first
//! element not less than the key. The merge needs both flavors to keep equal elements in their
//! original order.
//!
//! Returned positions are always within the searched range, no matter what the predicate answers.

/// Binary search in `lo..hi`.
pub fn locate<P>(mut lo: usize, mut hi: usize, pred: &mut P) -> usize
where
    P: FnMut(usize) -> bool,
{
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    lo
}

/// Like [`locate`] in `0..len`, but probes exponentially from the front first.
///
/// Finding a position `k` costs O(log k) predicate calls instead of O(log len). In the merge the
/// position is usually close to the start, that's what makes galloping pay off.
pub fn gallop<P>(len: usize, pred: &mut P) -> usize
where
    P: FnMut(usize) -> bool,
{
    // Probe 0, 1, 3, 7, ... until the predicate fails.
    let mut last_ofs = 0;
    let mut ofs = 1;
    while ofs <= len && pred(ofs - 1) {
        last_ofs = ofs;
        ofs = ofs.saturating_mul(2);
    }

    // The predicate holds below `last_ofs` and, if ofs <= len, fails at `ofs - 1`.
    let hi = if ofs > len { len } else { ofs - 1 };
    locate(last_ofs, hi, pred)
}

/// Like [`locate`] in `0..len`, but probes exponentially from the back first.
///
/// Used when merging from the back, where the answer is usually close to `len`.
pub fn gallop_rev<P>(len: usize, pred: &mut P) -> usize
where
    P: FnMut(usize) -> bool,
{
    // Probe len - 1, len - 2, len - 4, ... until the predicate holds.
    let mut last_ofs = 0;
    let mut ofs = 1;
    while ofs <= len && !pred(len - ofs) {
        last_ofs = ofs;
        ofs = ofs.saturating_mul(2);
    }

    // The predicate fails from `len - last_ofs` on and, if ofs <= len, holds at `len - ofs`.
    let lo = if ofs > len { 0 } else { len - ofs + 1 };
    locate(lo, len - last_ofs, pred)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_ties() {
        let v = [1, 2, 2, 2, 5, 8];

        let upper = |key: i32| locate(0, v.len(), &mut |i| v[i] <= key);
        let lower = |key: i32| locate(0, v.len(), &mut |i| v[i] < key);

        assert_eq!(upper(2), 4);
        assert_eq!(lower(2), 1);
        assert_eq!(upper(0), 0);
        assert_eq!(lower(9), 6);
        assert_eq!(upper(4), 4);

        // Sub-ranges return absolute positions.
        assert_eq!(locate(2, 5, &mut |i| v[i] <= 2), 4);
        assert_eq!(locate(3, 3, &mut |_| true), 3);
    }

    #[test]
    fn gallop_matches_partition_point() {
        let v: Vec<i32> = (0..300).map(|i| i / 3).collect();

        for len in [0, 1, 2, 7, 40, 300] {
            let w = &v[..len];

            for key in -2..105 {
                let upper = w.partition_point(|&e| e <= key);
                let lower = w.partition_point(|&e| e < key);

                assert_eq!(gallop(len, &mut |i| w[i] <= key), upper, "key {key}");
                assert_eq!(gallop(len, &mut |i| w[i] < key), lower, "key {key}");
                assert_eq!(gallop_rev(len, &mut |i| w[i] <= key), upper, "key {key}");
                assert_eq!(gallop_rev(len, &mut |i| w[i] < key), lower, "key {key}");
            }
        }
    }

    #[test]
    fn gallop_few_comparisons_near_the_ends() {
        let v: Vec<i32> = (0..1_000_000).collect();

        let mut count = 0;
        let pos = gallop(v.len(), &mut |i| {
            count += 1;
            v[i] < 3
        });

        assert_eq!(pos, 3);
        assert!(count < 8, "{count} comparisons");

        count = 0;
        let pos = gallop_rev(v.len(), &mut |i| {
            count += 1;
            v[i] <= 1_000_000 - 3
        });

        assert_eq!(pos, 1_000_000 - 2);
        assert!(count < 8, "{count} comparisons");
    }

    #[test]
    fn stays_in_bounds_with_lying_predicate() {
        let len = 5;

        for answer in [true, false] {
            let mut seen_oob = false;
            let mut liar = |i: usize| {
                seen_oob |= i >= len;
                answer
            };

            assert!(gallop(len, &mut liar) <= len);
            assert!(gallop_rev(len, &mut liar) <= len);
            assert!(locate(1, 4, &mut liar) <= 4);
            assert!(!seen_oob);
        }

        // Alternating answers.
        let mut flip = false;
        let mut liar = |_: usize| {
            flip = !flip;
            flip
        };
        assert!(gallop(len, &mut liar) <= len);
        assert!(gallop_rev(len, &mut liar) <= len);
    }
}
