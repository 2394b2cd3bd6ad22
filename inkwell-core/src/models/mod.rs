pub mod chat;
pub mod collaboration;
pub mod draft;
pub mod post;

pub use chat::ChatMessage;
pub use collaboration::{Collaboration, FeedbackRequest, Invitation, NewCollaboration, Participant};
pub use draft::DraftRecord;
pub use post::{LikeOutcome, NewPost, Post, PostFilter};
