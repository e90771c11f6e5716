//! How the sort reaches its elements.
//!
//! Run detection, insertion sort and merging never see an element type. They step through memory
//! `elem_size` bytes at a time and ask an [`Elements`] strategy to compare two elements. [`Typed`]
//! backs the slice entry points, [`Opaque`] sorts fixed-size records in a byte buffer. Byte offsets
//! only appear where an element index is turned into a pointer.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::{mem, ptr, slice};

use crate::error::SortError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocPolicy {
    Abort,
    Fallible,
}

pub fn alloc_vec<X>(policy: AllocPolicy, capacity: usize) -> Result<Vec<X>, SortError> {
    match policy {
        AllocPolicy::Abort => Ok(Vec::with_capacity(capacity)),
        AllocPolicy::Fallible => {
            let mut vec = Vec::new();
            vec.try_reserve_exact(capacity)
                .map_err(|_| SortError::AllocationFailed { elems: capacity })?;
            Ok(vec)
        }
    }
}

/// Element layout and order of one sort call.
///
/// # Safety
///
/// `elem_size` must be non-zero and equal to the distance between two neighbouring elements in
/// the buffer being sorted. Scratch storage must be suitably aligned for the elements.
pub unsafe trait Elements {
    /// Owns the room for the shorter run of a merge.
    type Scratch;

    fn elem_size(&self) -> usize;

    /// Allocates room for `elems` elements.
    fn alloc_scratch(&self, policy: AllocPolicy, elems: usize)
        -> Result<Self::Scratch, SortError>;

    fn scratch_ptr(scratch: &mut Self::Scratch) -> *mut u8;

    /// # Safety
    ///
    /// `a` and `b` must point to initialized elements.
    unsafe fn is_less(&mut self, a: *const u8, b: *const u8) -> bool;
}

/// Elements of type `T`, ordered by a less-than predicate.
pub struct Typed<T, F> {
    is_less: F,
    marker: PhantomData<fn(&T, &T)>,
}

impl<T, F> Typed<T, F>
where
    F: FnMut(&T, &T) -> bool,
{
    /// `None` for zero-sized types, there is nothing to step over.
    pub fn new(is_less: F) -> Option<Self> {
        if mem::size_of::<T>() == 0 {
            return None;
        }

        Some(Self {
            is_less,
            marker: PhantomData,
        })
    }
}

// SAFETY: `T` is not zero-sized, elements of a `[T]` are `size_of::<T>()` apart and `Vec<T>` is
// aligned for `T`.
unsafe impl<T, F> Elements for Typed<T, F>
where
    F: FnMut(&T, &T) -> bool,
{
    type Scratch = Vec<T>;

    #[inline(always)]
    fn elem_size(&self) -> usize {
        mem::size_of::<T>()
    }

    fn alloc_scratch(&self, policy: AllocPolicy, elems: usize) -> Result<Vec<T>, SortError> {
        alloc_vec(policy, elems)
    }

    fn scratch_ptr(scratch: &mut Vec<T>) -> *mut u8 {
        scratch.as_mut_ptr().cast()
    }

    #[inline(always)]
    unsafe fn is_less(&mut self, a: *const u8, b: *const u8) -> bool {
        // SAFETY: The caller guarantees both point to initialized `T`s.
        unsafe { (self.is_less)(&*a.cast::<T>(), &*b.cast::<T>()) }
    }
}

/// Records of `size` bytes, ordered by a three-way comparison of their bytes.
pub struct Opaque<F> {
    size: usize,
    compare: F,
}

impl<F> Opaque<F>
where
    F: FnMut(&[u8], &[u8]) -> Ordering,
{
    /// `None` if `size` is zero.
    pub fn new(size: usize, compare: F) -> Option<Self> {
        if size == 0 {
            return None;
        }

        Some(Self { size, compare })
    }
}

// SAFETY: `size` is non-zero, records are packed back to back and bytes need no alignment.
unsafe impl<F> Elements for Opaque<F>
where
    F: FnMut(&[u8], &[u8]) -> Ordering,
{
    type Scratch = Vec<u8>;

    #[inline(always)]
    fn elem_size(&self) -> usize {
        self.size
    }

    fn alloc_scratch(&self, policy: AllocPolicy, elems: usize) -> Result<Vec<u8>, SortError> {
        let bytes = elems
            .checked_mul(self.size)
            .ok_or(SortError::AllocationFailed { elems })?;
        alloc_vec(policy, bytes).map_err(|_| SortError::AllocationFailed { elems })
    }

    fn scratch_ptr(scratch: &mut Vec<u8>) -> *mut u8 {
        scratch.as_mut_ptr()
    }

    #[inline]
    unsafe fn is_less(&mut self, a: *const u8, b: *const u8) -> bool {
        // SAFETY: The caller guarantees both point to initialized records of `size` bytes.
        let (a, b) = unsafe {
            (
                slice::from_raw_parts(a, self.size),
                slice::from_raw_parts(b, self.size),
            )
        };

        (self.compare)(a, b) == Ordering::Less
    }
}

/// Swaps the `size` byte elements at `a` and `b`.
///
/// # Safety
///
/// Both must be valid for reads and writes of `size` bytes, and either equal or not overlapping.
#[inline]
pub unsafe fn swap_elems(a: *mut u8, b: *mut u8, size: usize) {
    if a != b {
        // SAFETY: See above. The swap is untyped, padding bytes are carried along as they are.
        unsafe { ptr::swap_nonoverlapping(a, b, size) };
    }
}

/// Reverses the `len` elements of `size` bytes starting at `v`.
///
/// # Safety
///
/// `v` must be valid for reads and writes of `len * size` bytes.
pub unsafe fn reverse(v: *mut u8, len: usize, size: usize) {
    for i in 0..len / 2 {
        // SAFETY: `i < len - 1 - i`, both are in bounds and distinct.
        unsafe { swap_elems(v.add(i * size), v.add((len - 1 - i) * size), size) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_compares_values() {
        let v = [3u64, 1, 2];
        let mut elems = Typed::new(|a: &u64, b: &u64| a < b).unwrap();
        assert_eq!(elems.elem_size(), 8);

        let p: *const u8 = v.as_ptr().cast();
        // SAFETY: Both point into `v`.
        unsafe {
            assert!(elems.is_less(p.add(8), p));
            assert!(!elems.is_less(p, p.add(16)));
        }

        assert!(Typed::new(|_: &(), _: &()| false).is_none());
    }

    #[test]
    fn opaque_compares_records() {
        let v = [2u8, 9, 1, 7, 2, 0];
        let mut elems = Opaque::new(2, |a: &[u8], b: &[u8]| a[0].cmp(&b[0])).unwrap();

        let p = v.as_ptr();
        // SAFETY: All three records are in `v`.
        unsafe {
            assert!(elems.is_less(p.add(2), p));
            assert!(!elems.is_less(p, p.add(4)));
            assert!(!elems.is_less(p.add(4), p));
        }

        assert!(Opaque::new(0, |a: &[u8], b: &[u8]| a.cmp(b)).is_none());
    }

    #[test]
    fn scratch_sizes() {
        let elems = Opaque::new(6, |a: &[u8], b: &[u8]| a.cmp(b)).unwrap();
        let scratch = elems.alloc_scratch(AllocPolicy::Fallible, 10).unwrap();
        assert_eq!(scratch.capacity(), 60);

        assert_eq!(
            elems.alloc_scratch(AllocPolicy::Fallible, usize::MAX / 2).err(),
            Some(SortError::AllocationFailed {
                elems: usize::MAX / 2
            })
        );

        let typed = Typed::new(|a: &u32, b: &u32| a < b).unwrap();
        assert_eq!(
            typed.alloc_scratch(AllocPolicy::Fallible, 16).map(|s| s.capacity()),
            Ok(16)
        );
        assert_eq!(
            alloc_vec::<u64>(AllocPolicy::Fallible, usize::MAX),
            Err(SortError::AllocationFailed { elems: usize::MAX })
        );
    }

    #[test]
    fn reverse_ranges() {
        let mut v: Vec<u8> = (0..9).collect();

        // SAFETY: Three records of three bytes.
        unsafe { reverse(v.as_mut_ptr(), 3, 3) };
        assert_eq!(v, [6, 7, 8, 3, 4, 5, 0, 1, 2]);

        // SAFETY: Four records of two bytes, the last byte is untouched.
        unsafe { reverse(v.as_mut_ptr(), 4, 2) };
        assert_eq!(v, [0, 1, 4, 5, 8, 3, 6, 7, 2]);

        // SAFETY: Empty and single element ranges are no-ops.
        unsafe {
            reverse(v.as_mut_ptr(), 0, 3);
            reverse(v.as_mut_ptr(), 1, 9);
        }
        assert_eq!(v, [0, 1, 4, 5, 8, 3, 6, 7, 2]);
    }
}
