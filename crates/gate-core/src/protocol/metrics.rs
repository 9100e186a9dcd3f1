//! Lock-free per-kind failure counters.
//!
//! Every closed connection that ended in a [`PipelineError`] bumps exactly one
//! counter here.  The counters are shared by all connection tasks through an
//! `Arc`, so each one is an `AtomicU64`: many tasks may record a failure at
//! the same instant without taking a lock.
//!
//! [`PipelineError`]: crate::protocol::error::PipelineError

use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::error::FailureKind;

/// Connection failure counts, one slot per [`FailureKind`].
///
/// # Examples
///
/// ```rust
/// use gate_core::{FailureCounters, FailureKind};
///
/// let counters = FailureCounters::new();
/// counters.record(FailureKind::IdleTimeout);
/// assert_eq!(counters.get(FailureKind::IdleTimeout), 1);
/// assert_eq!(counters.total(), 1);
/// ```
#[derive(Debug, Default)]
pub struct FailureCounters {
    slots: [AtomicU64; FailureKind::COUNT],
}

impl FailureCounters {
    /// Creates a new set of counters, all zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one failure of `kind`.
    ///
    /// `Ordering::Relaxed` is enough: the counts are diagnostics and do not
    /// publish any other memory.
    pub fn record(&self, kind: FailureKind) {
        self.slots[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current count for `kind`.
    pub fn get(&self, kind: FailureKind) -> u64 {
        self.slots[kind.index()].load(Ordering::Relaxed)
    }

    /// Returns the sum over all kinds.
    pub fn total(&self) -> u64 {
        FailureKind::ALL.iter().map(|kind| self.get(*kind)).sum()
    }

    /// Returns a `(kind, count)` pair for every kind, in index order.
    pub fn snapshot(&self) -> [(FailureKind, u64); FailureKind::COUNT] {
        FailureKind::ALL.map(|kind| (kind, self.get(kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_start_at_zero() {
        let counters = FailureCounters::new();
        assert_eq!(counters.total(), 0);
        for kind in FailureKind::ALL {
            assert_eq!(counters.get(kind), 0);
        }
    }

    #[test]
    fn test_record_only_touches_its_own_kind() {
        // Arrange
        let counters = FailureCounters::new();

        // Act
        counters.record(FailureKind::FramingViolation);
        counters.record(FailureKind::FramingViolation);
        counters.record(FailureKind::HandshakeRejected);

        // Assert
        assert_eq!(counters.get(FailureKind::FramingViolation), 2);
        assert_eq!(counters.get(FailureKind::HandshakeRejected), 1);
        assert_eq!(counters.get(FailureKind::IdleTimeout), 0);
        assert_eq!(counters.total(), 3);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let counters = Arc::new(FailureCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record(FailureKind::TransportError);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.get(FailureKind::TransportError), 8000);
    }

    #[test]
    fn test_snapshot_lists_every_kind_in_order() {
        let counters = FailureCounters::new();
        counters.record(FailureKind::IdleTimeout);

        let snapshot = counters.snapshot();

        assert_eq!(snapshot.len(), FailureKind::COUNT);
        assert_eq!(snapshot[FailureKind::IdleTimeout.index()], (FailureKind::IdleTimeout, 1));
        assert_eq!(snapshot[0].0, FailureKind::FramingViolation);
    }
}
