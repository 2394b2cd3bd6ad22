//! Debounced autosave.
//!
//! Every edit cancels the pending save and schedules a new one after the
//! quiet period. When the timer runs out uninterrupted, the session is
//! snapshotted into the draft slot. One cancellable task per session.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use inkwell_core::config::AutosaveConfig;
use inkwell_core::{DraftStore, StorageError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::notice::EditorNotice;
use crate::session::EditorSession;
use crate::{lock, SharedSession};

pub struct AutosaveScheduler {
    session: SharedSession,
    store: Arc<dyn DraftStore>,
    interval: Duration,
    placeholder: Arc<str>,
    notices: broadcast::Sender<EditorNotice>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl AutosaveScheduler {
    pub fn new(
        session: SharedSession,
        store: Arc<dyn DraftStore>,
        config: &AutosaveConfig,
        notices: broadcast::Sender<EditorNotice>,
    ) -> Self {
        Self {
            session,
            store,
            interval: config.interval(),
            placeholder: Arc::from(config.placeholder_title.as_str()),
            notices,
            pending: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Restart the quiet-period timer after a title or content change.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn on_edit(&self) {
        self.cancel();

        {
            let session = lock(&self.session);
            if !session.is_dirty() || session.is_blank() {
                return;
            }
        }

        let session = Arc::clone(&self.session);
        let store = Arc::clone(&self.store);
        let placeholder = Arc::clone(&self.placeholder);
        let notices = self.notices.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(interval).await;

            match persist(&session, store.as_ref(), &placeholder) {
                Ok(Some(saved_at)) => {
                    tracing::info!(%saved_at, "Draft auto-saved");
                    let _ = notices.send(EditorNotice::AutoSaved { saved_at });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to autosave draft");
                    let _ = notices.send(EditorNotice::AutoSaveFailed { error: e.to_string() });
                }
            }
        });

        *lock(&self.pending) = Some(handle);
    }

    /// Persist now, bypassing the timer. Returns the save time, or `None` when
    /// both fields are empty.
    pub fn force_save(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.cancel();
        let saved_at = persist(&self.session, self.store.as_ref(), &self.placeholder)?;
        if let Some(saved_at) = saved_at {
            tracing::info!(%saved_at, "Draft saved");
            let _ = self.notices.send(EditorNotice::Saved { saved_at });
        }
        Ok(saved_at)
    }

    /// Empty the slot and reset the session's save state.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.cancel();
        self.store.clear()?;
        lock(&self.session).mark_cleared();
        let _ = self.notices.send(EditorNotice::DraftCleared);
        Ok(())
    }

    /// Drop any pending save without writing.
    pub fn cancel(&self) {
        if let Some(handle) = lock(&self.pending).take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for AutosaveScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Snapshot and write under the session lock so writes stay ordered.
fn persist(
    session: &Mutex<EditorSession>,
    store: &dyn DraftStore,
    placeholder: &str,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    let mut session = lock(session);
    if !session.has_text() {
        return Ok(None);
    }

    let now = Utc::now();
    store.save(&session.snapshot(placeholder, now))?;
    session.mark_saved(now);
    Ok(Some(now))
}
