// Error taxonomy for tracker operations

use crate::item::ItemId;

/// Errors surfaced by the item store and the application layer.
///
/// `Validation` and `NotFound` block the mutation entirely. `Persistence`
/// is reported after the in-memory change has already been applied.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("item not found: {0}")]
    NotFound(ItemId),

    #[error("persistence failed: {0:#}")]
    Persistence(eyre::Report),
}

impl TrackerError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        TrackerError::Validation(msg.into())
    }

    /// True when the in-memory state is authoritative but was not saved
    pub fn is_persistence(&self) -> bool {
        matches!(self, TrackerError::Persistence(_))
    }
}

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
