//! Editor core: dirty tracking, debounced autosave and draft recovery.
//!
//! [`Editor`] wires the pieces to one draft slot. Front ends feed it edits and
//! listen for [`EditorNotice`]s.

pub mod autosave;
pub mod dirty;
pub mod error;
pub mod notice;
pub mod recovery;
pub mod session;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use inkwell_core::config::AutosaveConfig;
use inkwell_core::models::{NewPost, Post};
use inkwell_core::{DraftRecord, DraftStore, PostService};
use tokio::sync::broadcast;
use uuid::Uuid;

pub use autosave::AutosaveScheduler;
pub use dirty::DirtyTracker;
pub use error::EditorError;
pub use notice::EditorNotice;
pub use recovery::{RecoveryError, RecoveryFlow, RecoveryState};
pub use session::EditorSession;

pub type SharedSession = Arc<Mutex<EditorSession>>;

/// Lock ignoring poison: session state stays usable after a panicked holder.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Extra fields sent alongside the draft when publishing.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub published: bool,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

pub struct Editor {
    session: SharedSession,
    store: Arc<dyn DraftStore>,
    autosave: AutosaveScheduler,
    recovery: RecoveryFlow,
    notices: broadcast::Sender<EditorNotice>,
}

impl Editor {
    pub fn new(store: Arc<dyn DraftStore>, config: &AutosaveConfig) -> Self {
        let session: SharedSession = Arc::new(Mutex::new(EditorSession::new()));
        let (notices, _) = broadcast::channel(64);
        let autosave = AutosaveScheduler::new(Arc::clone(&session), Arc::clone(&store), config, notices.clone());

        Self {
            session,
            store,
            autosave,
            recovery: RecoveryFlow::new(),
            notices,
        }
    }

    /// Look for a leftover draft. Returns it when recovery is on offer.
    pub fn mount(&mut self) -> Option<&DraftRecord> {
        self.recovery.on_mount(self.store.as_ref());
        self.recovery.offered()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EditorNotice> {
        self.notices.subscribe()
    }

    /// Copy of the current session state.
    pub fn session(&self) -> EditorSession {
        lock(&self.session).clone()
    }

    pub fn recovery_state(&self) -> &RecoveryState {
        self.recovery.state()
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        lock(&self.session).set_title(title);
        self.autosave.on_edit();
    }

    pub fn set_content(&self, content: impl Into<String>) {
        lock(&self.session).set_content(content);
        self.autosave.on_edit();
    }

    pub fn force_save(&self) -> Result<Option<DateTime<Utc>>, EditorError> {
        Ok(self.autosave.force_save()?)
    }

    /// Restore the offered draft. Autosave picks it up like any other edit.
    pub fn recover(&mut self) -> Result<DraftRecord, EditorError> {
        let record = {
            let mut session = lock(&self.session);
            self.recovery.recover(&mut session)?
        };
        self.autosave.on_edit();
        Ok(record)
    }

    pub fn dismiss(&mut self) -> Result<(), EditorError> {
        self.recovery.dismiss(self.store.as_ref())?;
        Ok(())
    }

    pub fn clear_draft(&self) -> Result<(), EditorError> {
        Ok(self.autosave.clear()?)
    }

    /// Open a different named draft. The autosave slot is discarded first.
    pub fn load_draft(&self, title: impl Into<String>, content: impl Into<String>) -> Result<(), EditorError> {
        self.autosave.clear()?;
        lock(&self.session).load_clean(title, content);
        Ok(())
    }

    /// Append an assistant suggestion to the content and save right away.
    pub fn apply_suggestion(&self, suggestion: &str) -> Result<(), EditorError> {
        {
            let mut session = lock(&self.session);
            let updated = inkwell_core::apply_suggestion(suggestion, session.content());
            session.set_content(updated);
        }
        self.autosave.force_save()?;
        Ok(())
    }

    /// Send the draft to the data service. On success the autosave slot is cleared.
    pub async fn publish(
        &self,
        service: &dyn PostService,
        user_id: Uuid,
        options: PublishOptions,
    ) -> Result<Post, EditorError> {
        let (title, content) = {
            let session = lock(&self.session);
            (session.title().trim().to_string(), session.content().to_string())
        };
        if title.is_empty() {
            return Err(EditorError::Incomplete("title"));
        }
        if content.trim().is_empty() {
            return Err(EditorError::Incomplete("content"));
        }

        let mut post = NewPost::new(user_id, title, content, options.published);
        if let Some(excerpt) = options.excerpt.filter(|e| !e.trim().is_empty()) {
            post = post.with_excerpt(excerpt);
        }
        if let Some(category) = options.category.filter(|c| !c.trim().is_empty()) {
            post = post.with_category(category);
        }
        if !options.tags.is_empty() {
            post = post.with_tags(options.tags);
        }

        match service.create_post(post).await {
            Ok(created) => {
                // Post already exists remotely; a leftover slot is not a publish failure.
                if let Err(e) = self.autosave.clear() {
                    tracing::warn!(error = %e, "Failed to clear autosaved draft after publish");
                }
                tracing::info!(id = %created.id, published = created.published, "Draft published");
                let _ = self.notices.send(EditorNotice::Published { post_id: created.id });
                Ok(created)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to publish draft");
                let _ = self.notices.send(EditorNotice::PublishFailed { error: e.to_string() });
                Err(e.into())
            }
        }
    }

    /// Stop the pending autosave. Unsaved edits stay in memory only.
    pub fn unmount(&self) {
        self.autosave.cancel();
    }
}
