use std::fmt;

/// Errors reported by the fallible entry points.
///
/// Comparator misbehavior is never reported. An inconsistent comparator yields an unspecified
/// order, but every element stays in the buffer exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortError {
    /// Scratch or run stack storage for `elems` entries could not be allocated. Nothing in the
    /// buffer was moved.
    AllocationFailed { elems: usize },
    /// `sort_bytes` was given a non-empty buffer with an element size of zero.
    ZeroElementSize,
    /// The byte buffer length is not a whole number of elements.
    LengthNotMultiple { len: usize, size: usize },
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortError::AllocationFailed { elems } => {
                write!(f, "failed to allocate sort storage for {elems} elements")
            }
            SortError::ZeroElementSize => write!(f, "element size must be non-zero"),
            SortError::LengthNotMultiple { len, size } => write!(
                f,
                "buffer length {len} is not a multiple of the element size {size}"
            ),
        }
    }
}

impl std::error::Error for SortError {}
