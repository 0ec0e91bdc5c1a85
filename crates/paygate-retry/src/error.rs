//! Retry Store Errors

use thiserror::Error;

use crate::entry::RetryEntryId;

/// Result type alias for retry store operations
pub type Result<T> = std::result::Result<T, RetryError>;

/// Retry store errors
#[derive(Error, Debug)]
pub enum RetryError {
    /// No entry with the given id
    #[error("Retry entry not found: {0}")]
    EntryNotFound(RetryEntryId),

    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),
}
