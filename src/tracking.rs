//! Structured log of what the sort did.
//!
//! With the `tracking` feature enabled every sort call appends its events to a process global
//! log, which [`read_tracked_events`] drains. Without the feature recording is a no-op and the
//! log always reads empty.

/// A single step of the sort.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A run was found, padded to the minimum run length and pushed onto the run stack.
    RunPushed { start: usize, len: usize },
    /// The adjacent runs `start..start + left_len` and `start + left_len..start + left_len +
    /// right_len` are merged.
    Merge {
        start: usize,
        left_len: usize,
        right_len: usize,
    },
    /// A merge switched to galloping mode.
    GallopEnter { min_gallop: usize },
    /// Galloping didn't pay off, back to one element at a time.
    GallopExit { min_gallop: usize },
    /// All runs were found, `runs` are left on the stack to be merged.
    Collapse { runs: usize },
}

#[cfg(feature = "tracking")]
mod tracking_impl {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::Event;

    static TRACKED_EVENTS: Lazy<Mutex<Vec<Event>>> = Lazy::new(|| Mutex::new(Vec::new()));

    pub fn record(event: Event) {
        let mut events = TRACKED_EVENTS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
    }

    /// Returns all events recorded so far and clears the log.
    pub fn read_tracked_events() -> Vec<Event> {
        let mut events = TRACKED_EVENTS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *events)
    }
}

#[cfg(not(feature = "tracking"))]
mod tracking_impl {
    use super::Event;

    #[inline(always)]
    pub fn record(_event: Event) {}

    /// Returns all events recorded so far and clears the log.
    pub fn read_tracked_events() -> Vec<Event> {
        Vec::new()
    }
}

pub use tracking_impl::read_tracked_events;
pub(crate) use tracking_impl::record;
