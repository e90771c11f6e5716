//! Adaptive stable merge sort in the style of Timsort.
//!
//! The input is scanned for runs that are already ascending or strictly descending. Descending
//! runs are reversed, short runs are extended with binary insertion sort, and the runs are merged
//! following a set of length invariants that keep the merges balanced. Merges switch into a
//! galloping mode when one side keeps winning, which makes partially sorted data cheap to sort.
//!
//! Typed slices are sorted with [`sort`], [`sort_by`] and [`sort_by_key`], or their fallible
//! counterparts [`try_sort`] and [`try_sort_by`]. Opaque fixed-size records in a byte buffer are
//! sorted in place with [`sort_bytes`], by the same code and with the same scratch space of half
//! the element count.

#![deny(unsafe_op_in_unsafe_fn)]

mod access;
mod elem;
mod error;
mod insertion;
mod merge;
mod runs;
mod search;
mod timsort;

pub mod tracking;

pub use elem::{sort_bytes, ElemBuf};
pub use error::SortError;
pub use merge::MIN_GALLOP;
pub use runs::{minrun, MIN_MERGE};
pub use timsort::{sort, sort_by, sort_by_key, try_sort, try_sort_by};
