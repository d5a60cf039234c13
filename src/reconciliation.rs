//! Reconciliation of running replicas against a desired spec.
//!
//! One pass checks the engine version, groups the running containers by
//! image and command, and then creates, stops, kills, restarts or removes
//! containers until the group matches the desired state. Nothing is kept
//! between passes: the engine is the only source of truth.
//!
//! Re-exports:
//! - [`Reconciler`], [`ReconcileOptions`] and [`run`]: the pass itself.
//! - [`ReconciliationResult`], [`HostResult`]: what a pass reports.

pub mod matching;
pub mod reconciler;
#[cfg(test)]
pub mod integration_tests;
pub mod types;
pub mod version;

pub use reconciler::{run, ReconcileOptions, Reconciler};
pub use types::{HostFacts, HostResult, ReconciliationResult};
pub use version::MINIMUM_ENGINE_VERSION;
