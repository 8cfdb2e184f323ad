//! Error types surfaced by the synchronizer.

/// Errors returned when a [`Synchronizer`](crate::Synchronizer) is misused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The operation is not valid in the synchronizer's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}
