use thiserror::Error;

use crate::assistant::AssistantError;
use crate::draft_store::StorageError;
use crate::posts::PostServiceError;
use crate::protocol::ProtocolError;

#[derive(Error, Debug)]
pub enum InkwellError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    #[error("Post service error: {0}")]
    Posts(#[from] PostServiceError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Other error: {0}")]
    Other(String),
}

impl InkwellError {
    /// Remote collaborator failures are shown to the user as a dismissable
    /// notice; everything else is local.
    pub fn is_remote(&self) -> bool {
        matches!(self, InkwellError::Assistant(_) | InkwellError::Posts(_))
    }
}
