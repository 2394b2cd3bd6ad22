use inkwell_core::{DraftRecord, DraftStore};
use thiserror::Error;

use crate::session::EditorSession;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("No draft recovery is on offer")]
    NotOffered,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RecoveryState {
    #[default]
    Idle,
    RecoveryOffered(DraftRecord),
    Resolved,
}

/// One-shot decision between restoring a found draft and discarding it.
#[derive(Debug, Default)]
pub struct RecoveryFlow {
    state: RecoveryState,
}

impl RecoveryFlow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the slot. Only an idle flow looks; later mounts change nothing.
    pub fn on_mount(&mut self, store: &dyn DraftStore) -> &RecoveryState {
        if self.state == RecoveryState::Idle {
            if let Some(record) = store.load().filter(DraftRecord::has_content) {
                tracing::info!(saved_at = %record.saved_at, "Found unsaved draft");
                self.state = RecoveryState::RecoveryOffered(record);
            }
        }
        &self.state
    }

    pub fn state(&self) -> &RecoveryState {
        &self.state
    }

    pub fn offered(&self) -> Option<&DraftRecord> {
        match &self.state {
            RecoveryState::RecoveryOffered(record) => Some(record),
            _ => None,
        }
    }

    /// Restore the offered draft into `session`.
    pub fn recover(&mut self, session: &mut EditorSession) -> Result<DraftRecord, RecoveryError> {
        let record = self.take_offer()?;
        session.set_title(record.title.clone());
        session.set_content(record.content.clone());
        tracing::info!("Draft recovered");
        Ok(record)
    }

    /// Discard the offered draft. The session is left alone.
    pub fn dismiss(&mut self, store: &dyn DraftStore) -> Result<(), RecoveryError> {
        self.take_offer()?;
        if let Err(e) = store.clear() {
            tracing::warn!(error = %e, "Failed to clear dismissed draft");
        }
        Ok(())
    }

    fn take_offer(&mut self) -> Result<DraftRecord, RecoveryError> {
        match std::mem::replace(&mut self.state, RecoveryState::Resolved) {
            RecoveryState::RecoveryOffered(record) => Ok(record),
            other => {
                self.state = other;
                Err(RecoveryError::NotOffered)
            }
        }
    }
}
