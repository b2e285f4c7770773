//! Progress reporting for per-feature spatial work.
//!
//! Joins and attributions walk every parcel, which for a citywide parcel
//! layer is a few hundred thousand rows. [`ProgressCallback`] keeps that
//! reporting independent of the terminal backend; the CLI plugs in an
//! `indicatif` bar and tests use [`NullProgress`].

use std::sync::Arc;

/// Trait for reporting progress from long-running spatial operations.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// A [`ProgressCallback`] that ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
