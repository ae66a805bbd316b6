//! Ring snapshot directories
//!
//! `store` holds the storage capabilities a ring medium must offer, with the
//! local filesystem implementation; `propagator` builds ring 0 and promotes
//! snapshots ring by ring under the version-marker check.

pub mod propagator;
pub mod store;

pub use propagator::{compile_pattern, select_artifacts, PromoteResult, RingPropagation, RingPropagator};
#[cfg(test)]
pub use propagator::MockRingPropagation;
pub use store::{FsRingStore, RingStore, MARKER_FILE};
