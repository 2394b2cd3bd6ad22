pub mod assistant;
pub mod collaborations;
pub mod config;
pub mod draft_store;
pub mod error;
pub mod models;
pub mod posts;
pub mod protocol;
pub mod seo;

pub use assistant::{
    apply_suggestion, parse_suggestions, AssistantError, OpenAiSuggestionClient, SuggestionAction,
    SuggestionBackend, SuggestionRequest, SuggestionResponse,
};
pub use collaborations::CollaborationService;
pub use config::InkwellConfig;
pub use draft_store::{DraftStore, FileDraftStore, MemoryDraftStore, StorageError};
pub use error::InkwellError;
pub use models::{ChatMessage, DraftRecord};
pub use posts::{PostService, PostServiceError, RestPostClient};
