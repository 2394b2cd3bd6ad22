use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A relayed chat line. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub user: String,
    pub message: String,
    pub collaboration_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}
