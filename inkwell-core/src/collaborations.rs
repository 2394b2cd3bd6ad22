//! Collaboration rooms on the remote data service.
//!
//! A collaboration's id doubles as the chat relay's `collaborationId`. Seat
//! counts are kept by the `increment_collaborators` / `decrement_collaborators`
//! procedures, as likes are for posts.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::collaboration::{ROLE_COLLABORATOR, ROLE_CREATOR};
use crate::models::{Collaboration, FeedbackRequest, Invitation, NewCollaboration};
use crate::posts::{PostServiceError, RestPostClient};

const SELECT_WITH_PARTICIPANTS: &str = "*,participants:collaboration_participants(*)";

#[async_trait]
pub trait CollaborationService: Send + Sync {
    /// Rooms `user_id` created or takes part in.
    async fn fetch_collaborations(&self, user_id: Uuid) -> Result<Vec<Collaboration>, PostServiceError>;

    /// Create a room and seat its creator as a participant.
    async fn create_collaboration(&self, collaboration: NewCollaboration) -> Result<Collaboration, PostServiceError>;

    async fn join_collaboration(&self, collaboration_id: Uuid, user_id: Uuid, role: &str) -> Result<(), PostServiceError>;

    async fn leave_collaboration(&self, collaboration_id: Uuid, user_id: Uuid) -> Result<(), PostServiceError>;

    async fn invite_collaborator(&self, invitation: Invitation) -> Result<(), PostServiceError>;

    async fn request_feedback(&self, request: FeedbackRequest) -> Result<(), PostServiceError>;
}

/// Cheap shape check before an invitation goes out.
fn validate_email(email: &str) -> Result<(), PostServiceError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace) => {
            Ok(())
        }
        _ => Err(PostServiceError::Invalid(format!("not an email address: {:?}", email))),
    }
}

impl RestPostClient {
    async fn insert(&self, table: &str, row: &impl serde::Serialize) -> Result<reqwest::Response, PostServiceError> {
        let request = self
            .authed(self.http().post(self.url(table)))?
            .header("Prefer", "return=representation")
            .json(row);
        Self::check(request.send().await?).await
    }
}

#[async_trait]
impl CollaborationService for RestPostClient {
    async fn fetch_collaborations(&self, user_id: Uuid) -> Result<Vec<Collaboration>, PostServiceError> {
        let member = format!("(creator_id.eq.{id},participants.user_id.eq.{id})", id = user_id);
        let request = self.authed(self.http().get(self.url("collaborations")))?.query(&[
            ("select", SELECT_WITH_PARTICIPANTS),
            ("or", member.as_str()),
            ("order", "updated_at.desc"),
        ]);
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn create_collaboration(&self, collaboration: NewCollaboration) -> Result<Collaboration, PostServiceError> {
        if collaboration.title.trim().is_empty() {
            return Err(PostServiceError::Invalid("collaboration title is empty".to_string()));
        }

        let creator_id = collaboration.creator_id;
        let rows: Vec<Collaboration> = self.insert("collaborations", &collaboration).await?.json().await?;
        let created = rows.into_iter().next().ok_or(PostServiceError::EmptyResponse)?;

        // The room already exists; a missing creator seat is repaired by joining later.
        let seat = serde_json::json!({
            "collaboration_id": created.id,
            "user_id": creator_id,
            "role": ROLE_CREATOR,
        });
        if let Err(e) = self.insert("collaboration_participants", &seat).await {
            tracing::warn!(id = %created.id, error = %e, "Failed to seat collaboration creator");
        }

        tracing::info!(id = %created.id, "Collaboration created");
        Ok(created)
    }

    async fn join_collaboration(&self, collaboration_id: Uuid, user_id: Uuid, role: &str) -> Result<(), PostServiceError> {
        let role = if role.trim().is_empty() { ROLE_COLLABORATOR } else { role };
        let seat = serde_json::json!({
            "collaboration_id": collaboration_id,
            "user_id": user_id,
            "role": role,
        });
        self.insert("collaboration_participants", &seat).await?;
        self.rpc("increment_collaborators", serde_json::json!({ "collaboration_id": collaboration_id }))
            .await?;
        tracing::debug!(collaboration = %collaboration_id, role, "Joined collaboration");
        Ok(())
    }

    async fn leave_collaboration(&self, collaboration_id: Uuid, user_id: Uuid) -> Result<(), PostServiceError> {
        let collaboration_filter = format!("eq.{}", collaboration_id);
        let user_filter = format!("eq.{}", user_id);
        let request = self
            .authed(self.http().delete(self.url("collaboration_participants")))?
            .query(&[("collaboration_id", &collaboration_filter), ("user_id", &user_filter)]);
        Self::check(request.send().await?).await?;
        self.rpc("decrement_collaborators", serde_json::json!({ "collaboration_id": collaboration_id }))
            .await?;
        tracing::debug!(collaboration = %collaboration_id, "Left collaboration");
        Ok(())
    }

    async fn invite_collaborator(&self, mut invitation: Invitation) -> Result<(), PostServiceError> {
        invitation.email = invitation.email.trim().to_string();
        validate_email(&invitation.email)?;
        if invitation.role.trim().is_empty() {
            invitation.role = ROLE_COLLABORATOR.to_string();
        }
        self.insert("collaboration_invitations", &invitation).await?;
        tracing::info!(collaboration = %invitation.collaboration_id, role = %invitation.role, "Invitation sent");
        Ok(())
    }

    async fn request_feedback(&self, request: FeedbackRequest) -> Result<(), PostServiceError> {
        if request.message.trim().is_empty() {
            return Err(PostServiceError::Invalid("feedback request message is empty".to_string()));
        }
        self.insert("collaboration_feedback_requests", &request).await?;
        tracing::info!(collaboration = %request.collaboration_id, "Feedback requested");
        Ok(())
    }
}
