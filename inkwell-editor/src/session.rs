use chrono::{DateTime, Utc};
use inkwell_core::DraftRecord;

use crate::dirty::DirtyTracker;

/// In-memory state of the active editing view. Never persisted directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorSession {
    title: String,
    content: String,
    dirty: DirtyTracker,
    last_saved: Option<DateTime<Utc>>,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_dirty()
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    /// Returns whether the value changed.
    pub fn set_title(&mut self, title: impl Into<String>) -> bool {
        let title = title.into();
        let changed = title != self.title;
        self.title = title;
        self.dirty.observe(changed, self.has_text());
        changed
    }

    /// Returns whether the value changed.
    pub fn set_content(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        let changed = content != self.content;
        self.content = content;
        self.dirty.observe(changed, self.has_text());
        changed
    }

    /// Either field is non-empty (whitespace counts).
    pub fn has_text(&self) -> bool {
        !self.title.is_empty() || !self.content.is_empty()
    }

    /// Both fields are empty or whitespace only: nothing worth autosaving.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }

    pub fn snapshot(&self, placeholder: &str, at: DateTime<Utc>) -> DraftRecord {
        DraftRecord::snapshot(&self.title, &self.content, placeholder, at)
    }

    pub(crate) fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.dirty.mark_clean();
        self.last_saved = Some(at);
    }

    pub(crate) fn mark_cleared(&mut self) {
        self.dirty.mark_clean();
        self.last_saved = None;
    }

    /// Replace both fields without marking the session dirty.
    pub(crate) fn load_clean(&mut self, title: impl Into<String>, content: impl Into<String>) {
        self.title = title.into();
        self.content = content.into();
        self.mark_cleared();
    }
}
