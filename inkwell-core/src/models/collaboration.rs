use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role given to whoever creates a collaboration.
pub const ROLE_CREATOR: &str = "creator";
/// Default role when joining or inviting.
pub const ROLE_COLLABORATOR: &str = "collaborator";

/// A writing room. Its `id` is the chat relay's `collaborationId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaboration {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub category: Option<String>,
    pub creator_id: Uuid,
    #[serde(default)]
    pub current_collaborators: i32,
    pub max_collaborators: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl Collaboration {
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.participants.iter().any(|p| p.user_id == user_id)
    }

    /// No seat left. Rooms without a limit never fill up.
    pub fn is_full(&self) -> bool {
        self.max_collaborators
            .is_some_and(|max| self.current_collaborators >= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub collaboration_id: Uuid,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

/// Insert payload for the `collaborations` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCollaboration {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_collaborators: Option<i32>,
    pub creator_id: Uuid,
}

impl NewCollaboration {
    pub fn new(creator_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            category: None,
            max_collaborators: None,
            creator_id,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_max_collaborators(mut self, max: i32) -> Self {
        self.max_collaborators = Some(max);
        self
    }
}

/// Pending invitation row for `collaboration_invitations`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invitation {
    pub collaboration_id: Uuid,
    pub inviter_id: Uuid,
    pub email: String,
    pub role: String,
}

/// Feedback request row for `collaboration_feedback_requests`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRequest {
    pub collaboration_id: Uuid,
    pub requester_id: Uuid,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(max: Option<i32>, current: i32) -> Collaboration {
        Collaboration {
            id: Uuid::new_v4(),
            title: "Room".into(),
            description: None,
            status: "active".into(),
            category: None,
            creator_id: Uuid::nil(),
            current_collaborators: current,
            max_collaborators: max,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            participants: Vec::new(),
        }
    }

    #[test]
    fn test_unlimited_room_is_never_full() {
        assert!(!room(None, 100).is_full());
        assert!(room(Some(3), 3).is_full());
        assert!(!room(Some(3), 2).is_full());
    }

    #[test]
    fn test_creator_counts_as_member() {
        let collab = room(None, 1);
        assert!(collab.is_member(Uuid::nil()));
        assert!(!collab.is_member(Uuid::new_v4()));
    }

    #[test]
    fn test_row_without_participants_deserializes() {
        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "title": "Essay",
            "description": null,
            "status": "active",
            "category": "Culture",
            "creator_id": Uuid::nil(),
            "max_collaborators": 4,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        });
        let collab: Collaboration = serde_json::from_value(row).unwrap();
        assert_eq!(collab.current_collaborators, 0);
        assert!(collab.participants.is_empty());
    }

    #[test]
    fn test_new_collaboration_skips_absent_optionals() {
        let value = serde_json::to_value(NewCollaboration::new(Uuid::nil(), "Essay").with_max_collaborators(5)).unwrap();
        assert!(value.get("description").is_none());
        assert_eq!(value["max_collaborators"], 5);
    }
}
