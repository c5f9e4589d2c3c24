//! Monotonic request stamps.
//!
//! Every snapshot request the store issues is stamped with the next value of a
//! [`SequenceCounter`].  When responses land out of order the stamps tell the
//! store whether it is applying a fresher or an older snapshot than the one it
//! already shows.  Stamps start at 1 so that 0 can mean "nothing applied yet".

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe, monotonically increasing request counter.
///
/// # Examples
///
/// ```rust
/// use netviz_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// assert_eq!(counter.current(), 2);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    /// Creates a counter whose first stamp is 1.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(0),
        }
    }

    /// Returns the next stamp.
    ///
    /// `Relaxed` is enough: stamps order requests, they do not publish memory.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Returns the most recently issued stamp (0 if none).
    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
