//! Accounting for SG descriptor arrays.
//!
//! Every unpack that allocates a descriptor array takes a token from the
//! [`DescriptorTracker`]; the array's [`DescriptorGuard`] hands it back
//! either through repack or, if the unpacked transaction is dropped early,
//! on drop. The counters make leaks observable:
//!
//! - `unpacked`: descriptor arrays allocated
//! - `repacked`: arrays released by repack
//! - `abandoned`: arrays released by drop without a repack
//!
//! Counters are lock-free atomics shared between clones.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    next_token: AtomicU64,
    unpacked: AtomicUsize,
    repacked: AtomicUsize,
    abandoned: AtomicUsize,
}

/// Shared counters of descriptor array allocations and releases.
#[derive(Debug, Clone, Default)]
pub struct DescriptorTracker {
    counters: Arc<Counters>,
}

impl DescriptorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new descriptor array and return its guard.
    ///
    /// Tokens start at 1 so a zero spare slot always means "no array".
    pub fn acquire(&self) -> DescriptorGuard {
        let token = self.counters.next_token.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.unpacked.fetch_add(1, Ordering::AcqRel);
        DescriptorGuard {
            tracker: self.clone(),
            token,
            repacked: false,
        }
    }

    /// Descriptor arrays allocated so far.
    #[inline]
    pub fn unpacked(&self) -> usize {
        self.counters.unpacked.load(Ordering::Acquire)
    }

    /// Descriptor arrays released through repack.
    #[inline]
    pub fn repacked(&self) -> usize {
        self.counters.repacked.load(Ordering::Acquire)
    }

    /// Descriptor arrays released without a repack.
    #[inline]
    pub fn abandoned(&self) -> usize {
        self.counters.abandoned.load(Ordering::Acquire)
    }

    /// Arrays currently alive.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.unpacked()
            .saturating_sub(self.repacked() + self.abandoned())
    }

    /// Every allocated array has been released by a repack.
    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.unpacked() == self.repacked()
    }
}

/// RAII token for one descriptor array.
#[derive(Debug)]
pub struct DescriptorGuard {
    tracker: DescriptorTracker,
    token: u64,
    repacked: bool,
}

impl DescriptorGuard {
    /// Receiver-local token recorded in the spare slot.
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Release through repack.
    pub fn release(mut self) {
        self.repacked = true;
    }
}

impl Drop for DescriptorGuard {
    fn drop(&mut self) {
        let counter = if self.repacked {
            &self.tracker.counters.repacked
        } else {
            tracing::warn!(
                "Descriptor array {} released without repack",
                self.token
            );
            &self.tracker.counters.abandoned
        };
        counter.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_creation() {
        let tracker = DescriptorTracker::new();
        assert_eq!(tracker.unpacked(), 0);
        assert_eq!(tracker.outstanding(), 0);
        assert!(tracker.is_balanced());
    }

    #[test]
    fn test_tokens_are_nonzero_and_unique() {
        let tracker = DescriptorTracker::new();
        let a = tracker.acquire();
        let b = tracker.acquire();

        assert_eq!(a.token(), 1);
        assert_eq!(b.token(), 2);
        assert_eq!(tracker.outstanding(), 2);

        a.release();
        b.release();
    }

    #[test]
    fn test_release_counts_as_repack() {
        let tracker = DescriptorTracker::new();
        let guard = tracker.acquire();
        assert!(!tracker.is_balanced());

        guard.release();
        assert_eq!(tracker.repacked(), 1);
        assert_eq!(tracker.abandoned(), 0);
        assert_eq!(tracker.outstanding(), 0);
        assert!(tracker.is_balanced());
    }

    #[test]
    fn test_drop_counts_as_abandoned() {
        let tracker = DescriptorTracker::new();
        {
            let _guard = tracker.acquire();
        }

        assert_eq!(tracker.abandoned(), 1);
        assert_eq!(tracker.repacked(), 0);
        assert_eq!(tracker.outstanding(), 0);
        assert!(!tracker.is_balanced());
    }

    #[test]
    fn test_clone_shares_state() {
        let tracker1 = DescriptorTracker::new();
        let tracker2 = tracker1.clone();

        tracker1.acquire().release();
        assert_eq!(tracker2.unpacked(), 1);
        assert_eq!(tracker2.repacked(), 1);
    }
}
