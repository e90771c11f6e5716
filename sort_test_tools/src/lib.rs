//! Shared test harness. Any stable sort implementing [`Sort`] can be run through the whole suite
//! with [`instantiate_sort_tests!`].

pub trait Sort {
    fn name() -> String;

    fn sort<T>(arr: &mut [T])
    where
        T: Ord;

    fn sort_by<T, F>(arr: &mut [T], compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering;
}

pub mod patterns;
