use crate::access::{swap_elems, Elements};
use crate::search::locate;

/// Sort the `len` elements at `v` assuming the first `offset` of them are already sorted.
///
/// Each later element is placed behind all equal elements of the sorted prefix, found by binary
/// search, and the elements in between are shifted up by one. That costs O(n log n) comparisons
/// but O(n^2) moves, so this is only meant for short ranges.
///
/// The element being inserted is compared in place and only moved once all comparisons for it are
/// done, so a panic in `is_less` leaves the range a permutation of its input.
///
/// # Safety
///
/// `v` must be valid for reads and writes of `len` elements laid out as `elems` describes.
#[cfg_attr(feature = "no_inline_sub_functions", inline(never))]
pub unsafe fn binary_insertion_sort<E: Elements>(
    v: *mut u8,
    len: usize,
    offset: usize,
    elems: &mut E,
) {
    let size = elems.elem_size();

    // This is a logic but not a safety bug.
    debug_assert!(offset <= len);

    for i in offset.max(1)..len {
        // SAFETY: `i < len` and every probed index is below `i`, all in bounds of `v`.
        unsafe {
            let key = v.add(i * size);
            let pos = locate(0, i, &mut |j| !elems.is_less(key, v.add(j * size)));

            // Moves v[i] in front of v[pos..i].
            for j in (pos..i).rev() {
                swap_elems(v.add(j * size), v.add((j + 1) * size), size);
            }
        }
    }
}
