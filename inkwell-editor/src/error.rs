use inkwell_core::{PostServiceError, StorageError};
use thiserror::Error;

use crate::recovery::RecoveryError;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Publish failed: {0}")]
    Publish(#[from] PostServiceError),

    #[error("Cannot publish: {0} is empty")]
    Incomplete(&'static str),
}

impl EditorError {
    /// The data service refused or failed the request.
    pub fn is_remote(&self) -> bool {
        matches!(self, EditorError::Publish(_))
    }
}
