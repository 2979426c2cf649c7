//! Progress reporting and cancellation hooks for the presentation layer.

/// Receives progress callbacks during comparison, import and export.
///
/// Implementations live in the presentation layer. The engine calls
/// [`ProgressReporter::set_progress`] once per unit of work and polls
/// [`ProgressReporter::is_cancelled`] between units; a cancelled operation
/// rolls back and returns [`crate::SyncError::Cancelled`].
pub trait ProgressReporter {
    /// Reports progress on the current phase.
    fn set_progress(&mut self, label: &str, current: usize, max: usize);

    /// Polled between units of work; return true to abort.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A reporter that discards everything and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn set_progress(&mut self, _label: &str, _current: usize, _max: usize) {}
}
