//! Sorting opaque fixed-size elements stored back to back in a byte buffer.
//!
//! Nothing is known about the elements except their size. They are handed to the comparator as
//! `&[u8]` sub-slices and moved as plain bytes. Public accessors are bounds checked.

use std::cmp::Ordering;
use std::ops::Range;

use crate::access::{reverse, AllocPolicy, Opaque};
use crate::error::SortError;
use crate::timsort::merge_sort;

/// A byte buffer viewed as a sequence of `elem_size` byte elements.
pub struct ElemBuf<'a> {
    bytes: &'a mut [u8],
    elem_size: usize,
}

impl<'a> ElemBuf<'a> {
    /// Fails if `elem_size` is zero or `bytes` doesn't hold a whole number of elements.
    pub fn new(bytes: &'a mut [u8], elem_size: usize) -> Result<Self, SortError> {
        if elem_size == 0 {
            return Err(SortError::ZeroElementSize);
        }

        if bytes.len() % elem_size != 0 {
            return Err(SortError::LengthNotMultiple {
                len: bytes.len(),
                size: elem_size,
            });
        }

        Ok(Self { bytes, elem_size })
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / self.elem_size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// The bytes of element `i`. Panics if `i` is out of bounds.
    #[inline]
    pub fn get(&self, i: usize) -> &[u8] {
        let offset = i * self.elem_size;
        &self.bytes[offset..offset + self.elem_size]
    }

    /// Swaps elements `i` and `j`. Panics if either is out of bounds.
    pub fn swap(&mut self, i: usize, j: usize) {
        let len = self.len();
        assert!(i < len && j < len, "swap({i}, {j}) out of bounds for length {len}");

        if i == j {
            return;
        }

        let (a, b) = if i < j { (i, j) } else { (j, i) };
        let size = self.elem_size;

        let (head, tail) = self.bytes.split_at_mut(b * size);
        head[a * size..(a + 1) * size].swap_with_slice(&mut tail[..size]);
    }

    /// Reverses the order of the elements in `range`.
    pub fn reverse(&mut self, range: Range<usize>) {
        assert!(
            range.start <= range.end && range.end <= self.len(),
            "reverse({range:?}) out of bounds for length {}",
            self.len()
        );

        let size = self.elem_size;
        // SAFETY: `range` was checked to be within the buffer.
        unsafe {
            reverse(
                self.bytes.as_mut_ptr().add(range.start * size),
                range.len(),
                size,
            );
        }
    }

    /// Sorts the elements stably by `compare`, moving them around in the buffer itself.
    ///
    /// Scratch space for half of the elements is allocated, unless the buffer is short or
    /// presorted. If that fails [`SortError::AllocationFailed`] is returned and nothing was
    /// moved. If `compare` panics the buffer holds a permutation of its original elements.
    pub fn sort_by<F>(&mut self, compare: F) -> Result<(), SortError>
    where
        F: FnMut(&[u8], &[u8]) -> Ordering,
    {
        let len = self.len();
        let Some(mut elems) = Opaque::new(self.elem_size, compare) else {
            // `new` rejects a zero element size.
            return Ok(());
        };

        // SAFETY: `bytes` holds exactly `len` records of `elem_size` bytes and is borrowed
        // exclusively.
        unsafe { merge_sort(self.bytes.as_mut_ptr(), len, &mut elems, AllocPolicy::Fallible) }
    }
}

/// Sorts `bytes`, a sequence of `elem_size` byte elements, stably by `compare`.
///
/// Fails before touching `bytes` if `elem_size` is zero or doesn't divide the buffer length. An
/// empty buffer is always sorted, whatever `elem_size` is. See [`ElemBuf::sort_by`].
pub fn sort_bytes<F>(bytes: &mut [u8], elem_size: usize, compare: F) -> Result<(), SortError>
where
    F: FnMut(&[u8], &[u8]) -> Ordering,
{
    if bytes.is_empty() {
        return Ok(());
    }

    ElemBuf::new(bytes, elem_size)?.sort_by(compare)
}
