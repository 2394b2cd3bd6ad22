//! Chat relay wire protocol (JSON text frames).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ChatMessage;

pub const GREETING: &str = "Connected to collaboration chat";
pub const PROCESSING_FAILED: &str = "Failed to process message";
pub const ANONYMOUS: &str = "Anonymous";

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported frame: {0}")]
    Unsupported(String),
}

/// Client → server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub message: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub collaboration_id: Option<String>,
}

impl ClientMessage {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Stamp the message with the relay's clock.
    pub fn into_chat(self, timestamp: DateTime<Utc>) -> ChatMessage {
        let user = match self.user {
            Some(u) if !u.is_empty() => u,
            _ => ANONYMOUS.to_string(),
        };
        ChatMessage {
            user,
            message: self.message,
            collaboration_id: self.collaboration_id,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    System,
    Message,
    Error,
}

/// Server → client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collaboration_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ServerMessage {
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::System,
            user: None,
            message: message.into(),
            collaboration_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Error,
            user: None,
            message: message.into(),
            collaboration_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn greeting() -> Self {
        Self::system(GREETING)
    }

    pub fn to_json(&self) -> String {
        // Plain strings and a timestamp: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<ChatMessage> for ServerMessage {
    fn from(chat: ChatMessage) -> Self {
        Self {
            kind: FrameKind::Message,
            user: Some(chat.user),
            message: chat.message,
            collaboration_id: chat.collaboration_id,
            timestamp: chat.timestamp,
        }
    }
}
