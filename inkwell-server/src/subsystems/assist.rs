//! Assistant subsystem: builds the suggestion backend and runs requests.
//!
//! The backend is optional. Without `OPENAI_API_KEY` the server still starts
//! and `/assist` answers with a "not configured" error body.

use std::sync::Arc;

use inkwell_core::assistant::MAX_SUGGESTIONS;
use inkwell_core::{
    AssistantError, InkwellConfig, OpenAiSuggestionClient, SuggestionBackend, SuggestionRequest, SuggestionResponse,
};

/// Create the suggestion backend from config and the environment.
pub fn create_backend_from_config(config: &InkwellConfig) -> Result<Arc<dyn SuggestionBackend>, AssistantError> {
    let client = OpenAiSuggestionClient::from_env(config.assistant.clone())?;
    Ok(Arc::new(client))
}

/// Run one suggestion request and shape the reply for the wire.
pub async fn run_suggestions(backend: &dyn SuggestionBackend, request: &SuggestionRequest) -> SuggestionResponse {
    match backend.suggest(request).await {
        Ok(mut suggestions) => {
            suggestions.truncate(MAX_SUGGESTIONS);
            tracing::info!(
                backend = backend.name(),
                action = ?request.action,
                count = suggestions.len(),
                "Suggestions generated"
            );
            SuggestionResponse::Suggestions {
                suggestions,
                action: request.action,
            }
        }
        Err(e) => {
            tracing::error!(backend = backend.name(), error = %e, "Suggestion request failed");
            SuggestionResponse::Error { error: e.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use inkwell_core::SuggestionAction;

    struct FixedBackend(Result<Vec<String>, ()>);

    #[async_trait]
    impl SuggestionBackend for FixedBackend {
        async fn suggest(&self, _request: &SuggestionRequest) -> Result<Vec<String>, AssistantError> {
            self.0.clone().map_err(|_| AssistantError::MissingCompletion)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_success_is_capped_at_three() {
        let backend = FixedBackend(Ok((1..=5).map(|i| format!("Suggestion number {}", i)).collect()));
        let request = SuggestionRequest::new(SuggestionAction::Seo, "t", "c");

        match run_suggestions(&backend, &request).await {
            SuggestionResponse::Suggestions { suggestions, action } => {
                assert_eq!(suggestions.len(), 3);
                assert_eq!(action, SuggestionAction::Seo);
            }
            other => panic!("Expected suggestions, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_becomes_error_body() {
        let backend = FixedBackend(Err(()));
        let request = SuggestionRequest::new(SuggestionAction::Generate, "t", "c");

        let response = run_suggestions(&backend, &request).await;
        assert!(matches!(response, SuggestionResponse::Error { .. }));
        assert!(response.into_suggestions().is_empty());
    }
}
