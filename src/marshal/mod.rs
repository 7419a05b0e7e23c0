//! Marshal module - the transaction lifecycle.
//!
//! One transaction moves through these steps, each exactly once:
//!
//! ```text
//! originator                       receiver
//! ──────────                       ────────
//! Request ──serialize──► wire ───► unpack ──► handler ──► repack
//!                                                            │
//! Request ◄───merge───── wire ◄──────────────────────────────┘
//! ```
//!
//! - [`Marshaler::serialize`] copies a request into one contiguous buffer,
//!   seeding every status field to failure.
//! - [`Marshaler::unpack`] rebuilds a request over the received buffer in
//!   place and allocates the SG descriptor array.
//! - [`UnpackedTransaction::repack`] writes the final status into the header
//!   and releases the descriptor array.
//! - [`Marshaler::merge`] copies data and status back into the original
//!   request.

mod merge;
mod serialize;
mod unpack;

pub use unpack::{SgDescriptors, UnpackedTransaction};

use crate::config::MarshalConfig;
use crate::tracker::DescriptorTracker;

/// Runs the marshaling steps under one set of limits.
///
/// Cheap to clone; clones share the descriptor tracker.
#[derive(Debug, Clone, Default)]
pub struct Marshaler {
    config: MarshalConfig,
    tracker: DescriptorTracker,
}

impl Marshaler {
    /// Create a marshaler with its own tracker.
    pub fn new(config: MarshalConfig) -> Self {
        Self {
            config,
            tracker: DescriptorTracker::new(),
        }
    }

    /// Create a marshaler that reports into an existing tracker.
    pub fn with_tracker(config: MarshalConfig, tracker: DescriptorTracker) -> Self {
        Self { config, tracker }
    }

    #[inline]
    pub fn config(&self) -> &MarshalConfig {
        &self.config
    }

    /// Descriptor accounting for transactions unpacked by this marshaler.
    #[inline]
    pub fn tracker(&self) -> &DescriptorTracker {
        &self.tracker
    }
}
