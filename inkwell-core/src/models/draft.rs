use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single unit held in the autosave slot.
///
/// Serialized as `{ "title", "content", "lastSaved" }` so the slot layout stays
/// readable by the web editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub title: String,
    pub content: String,
    #[serde(rename = "lastSaved")]
    pub saved_at: DateTime<Utc>,
}

impl DraftRecord {
    /// Snapshot an editor's fields, substituting `placeholder` for an empty title.
    pub fn snapshot(title: &str, content: &str, placeholder: &str, saved_at: DateTime<Utc>) -> Self {
        let title = if title.is_empty() { placeholder } else { title };
        Self {
            title: title.to_string(),
            content: content.to_string(),
            saved_at,
        }
    }

    /// Whether the record carries anything worth offering back to the user.
    pub fn has_content(&self) -> bool {
        !self.title.is_empty() || !self.content.is_empty()
    }
}
