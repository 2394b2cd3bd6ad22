use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Non-blocking, user-visible editor events (toasts).
#[derive(Debug, Clone, PartialEq)]
pub enum EditorNotice {
    /// "Draft auto-saved": the debounce timer wrote the slot.
    AutoSaved { saved_at: DateTime<Utc> },
    /// A background write failed. Silent in the UI; the next cycle retries.
    AutoSaveFailed { error: String },
    /// An explicit save wrote the slot.
    Saved { saved_at: DateTime<Utc> },
    DraftCleared,
    Published { post_id: Uuid },
    PublishFailed { error: String },
}

impl EditorNotice {
    /// Whether the notice should be shown to the writer.
    pub fn is_visible(&self) -> bool {
        !matches!(self, EditorNotice::AutoSaveFailed { .. })
    }
}
