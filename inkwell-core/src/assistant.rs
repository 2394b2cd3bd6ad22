//! AI writing assistant: suggestion generation over a chat-completions API
//!
//! Provides:
//! - the request/response contract shared by the server endpoint and its clients
//! - a `SuggestionBackend` trait with an OpenAI-compatible implementation
//! - the parsing heuristic that turns free-form model output into at most 3 suggestions
//! - `apply_suggestion`, which annotates the draft with a chosen suggestion

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::AssistantConfig;

/// Maximum number of suggestions returned per request.
pub const MAX_SUGGESTIONS: usize = 3;

const SYSTEM_PROMPT: &str = "You are an expert writing assistant. Provide exactly 3 specific, actionable suggestions. Each suggestion should be 1-2 sentences and start with an action verb. Be direct and helpful.";

// ============================================================================
// Contract types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionAction {
    #[serde(alias = "generate_suggestions")]
    Generate,
    #[serde(alias = "seo_suggestions")]
    Seo,
    #[serde(alias = "regenerate_suggestions")]
    Regenerate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub action: SuggestionAction,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "currentSuggestions", skip_serializing_if = "Option::is_none")]
    pub prior_suggestions: Option<Vec<String>>,
}

impl SuggestionRequest {
    pub fn new(action: SuggestionAction, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action,
            content: content.into(),
            title: title.into(),
            prior_suggestions: None,
        }
    }

    pub fn with_prior(mut self, prior: Vec<String>) -> Self {
        self.prior_suggestions = Some(prior);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuggestionResponse {
    Suggestions {
        suggestions: Vec<String>,
        action: SuggestionAction,
    },
    Error {
        error: String,
    },
}

impl SuggestionResponse {
    /// Errors and empty lists both mean "no suggestions available".
    pub fn into_suggestions(self) -> Vec<String> {
        match self {
            SuggestionResponse::Suggestions { suggestions, .. } => suggestions,
            SuggestionResponse::Error { error } => {
                tracing::warn!(error = %error, "Assistant returned an error, showing no suggestions");
                Vec::new()
            }
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("AI service not configured: missing API key")]
    MissingApiKey,

    #[error("Missing completion in response")]
    MissingCompletion,

    #[error("All {attempts} attempts failed, last error: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

impl AssistantError {
    /// Rate limits, upstream 5xx and connection trouble are worth another try.
    pub fn is_transient(&self) -> bool {
        match self {
            AssistantError::Api { code, .. } => *code == 429 || *code >= 500,
            AssistantError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

// ============================================================================
// Backend trait
// ============================================================================

#[async_trait]
pub trait SuggestionBackend: Send + Sync {
    /// Generate up to [`MAX_SUGGESTIONS`] suggestions for the draft.
    async fn suggest(&self, request: &SuggestionRequest) -> Result<Vec<String>, AssistantError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Run a backend and fold every failure into an empty list.
pub async fn suggestions_or_empty(backend: &dyn SuggestionBackend, request: &SuggestionRequest) -> Vec<String> {
    match backend.suggest(request).await {
        Ok(suggestions) => suggestions,
        Err(e) => {
            tracing::warn!(backend = backend.name(), error = %e, "Suggestion generation failed");
            Vec::new()
        }
    }
}

// ============================================================================
// Prompt construction
// ============================================================================

pub fn build_prompt(request: &SuggestionRequest) -> String {
    let title = if request.title.is_empty() { "Untitled" } else { &request.title };
    let content = if request.content.is_empty() { "No content yet" } else { &request.content };

    match request.action {
        SuggestionAction::Generate => format!(
            "As a writing assistant, analyze this content and provide 3 specific, actionable suggestions to improve the writing:\n\n\
             Title: {title}\nContent: {content}\n\n\
             Focus on:\n1. Content structure and flow\n2. Writing style and engagement\n3. Clarity and readability\n\n\
             Provide each suggestion as a complete sentence that starts with an action verb. Make suggestions specific to the content provided."
        ),
        SuggestionAction::Seo => format!(
            "As an SEO expert, analyze this blog post and provide 3 specific SEO improvements:\n\n\
             Title: {title}\nContent: {content}\n\n\
             Provide suggestions for:\n1. Title optimization\n2. Content structure for SEO\n3. Keywords and readability\n\n\
             Each suggestion should be actionable and specific to this content."
        ),
        SuggestionAction::Regenerate => {
            let prior = match &request.prior_suggestions {
                Some(p) if !p.is_empty() => p.join(", "),
                _ => "none".to_string(),
            };
            format!(
                "As a writing assistant, provide 3 NEW and different writing suggestions for this content. Avoid these previous suggestions: {prior}\n\n\
                 Title: {title}\nContent: {content}\n\n\
                 Focus on different aspects like:\n- Tone and voice\n- Examples and details\n- Structure and transitions\n- Reader engagement\n\n\
                 Provide fresh, specific suggestions that haven't been mentioned before."
            )
        }
    }
}

// ============================================================================
// Output parsing
// ============================================================================

fn numbered_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.?\s+").expect("valid regex"))
}

fn number_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.?\s*").expect("valid regex"))
}

fn sentence_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("valid regex"))
}

/// Extract up to three suggestions from model output.
///
/// Prefers list items; if fewer than three survive, falls back to sentences.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    let from_lines: Vec<String> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| numbered_line().is_match(line) || line.contains('.'))
        .map(|line| number_prefix().replace(line, "").trim().to_string())
        .filter(|line| line.chars().count() > 10)
        .take(MAX_SUGGESTIONS)
        .collect();

    if from_lines.len() >= MAX_SUGGESTIONS {
        return from_lines;
    }

    sentence_break()
        .split(text)
        .map(str::trim)
        .filter(|s| s.chars().count() > 20)
        .take(MAX_SUGGESTIONS)
        .map(|s| if s.ends_with('.') { s.to_string() } else { format!("{}.", s) })
        .collect()
}

// ============================================================================
// Applying a suggestion to the draft
// ============================================================================

/// Append `suggestion` to `content` as an annotation the writer can act on.
pub fn apply_suggestion(suggestion: &str, content: &str) -> String {
    let lower = suggestion.to_lowercase();

    if lower.contains("title") || lower.contains("headline") {
        return format!("{content}\n\n<!-- AI Suggestion for Title: {suggestion} -->\n");
    }
    if lower.contains("paragraph") || lower.contains("section") {
        return format!("{content}\n\n<!-- AI Suggestion: {suggestion} -->\n\n[Apply this suggestion here]\n");
    }
    if lower.contains("transition") || lower.contains("connect") {
        return format!("{content}\n\n<!-- Transition Suggestion: {suggestion} -->\n");
    }
    format!("{content}\n\n<!-- AI Writing Tip: {suggestion} -->\n")
}

// ============================================================================
// Chat-completions API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompletionMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// OpenAiSuggestionClient
// ============================================================================

/// Calls an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiSuggestionClient {
    client: Client,
    config: AssistantConfig,
    api_key: String,
}

impl OpenAiSuggestionClient {
    pub fn new(config: AssistantConfig, api_key: impl Into<String>) -> Result<Self, AssistantError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AssistantError::MissingApiKey);
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Build from config, reading the key from `OPENAI_API_KEY`.
    pub fn from_env(config: AssistantConfig) -> Result<Self, AssistantError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        Self::new(config, api_key)
    }

    /// Raw completion text for a prompt. Transient failures are retried with
    /// exponential backoff, up to `max_retries` extra attempts.
    pub async fn complete(&self, prompt: &str) -> Result<String, AssistantError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        match RetryIf::spawn(retry_strategy, || self.complete_once(prompt), AssistantError::is_transient).await {
            Ok(text) => Ok(text),
            Err(e) if e.is_transient() => {
                let attempts = self.config.max_retries + 1;
                tracing::error!(attempts, error = %e, "All completion attempts failed");
                Err(AssistantError::RetryExhausted {
                    attempts,
                    last: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, AssistantError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let request = CompletionRequest {
            model: &self.config.model,
            messages: vec![
                CompletionMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                CompletionMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(body);

            tracing::error!(code = status.as_u16(), message = %message, "Completion API error");
            return Err(AssistantError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(AssistantError::MissingCompletion)
    }
}

#[async_trait]
impl SuggestionBackend for OpenAiSuggestionClient {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<Vec<String>, AssistantError> {
        tracing::info!(action = ?request.action, "Requesting suggestions");
        let text = self.complete(&build_prompt(request)).await?;
        let suggestions = parse_suggestions(&text);
        tracing::debug!(count = suggestions.len(), "Parsed suggestions");
        Ok(suggestions)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> AssistantConfig {
        AssistantConfig {
            base_url,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            max_retries: 2,
            retry_delay_ms: 10,
        }
    }

    fn completion(text: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        })
    }

    #[test]
    fn test_action_accepts_long_names() {
        let req: SuggestionRequest = serde_json::from_value(serde_json::json!({
            "action": "seo_suggestions",
            "content": "c",
            "title": "t",
            "currentSuggestions": ["one"]
        }))
        .unwrap();
        assert_eq!(req.action, SuggestionAction::Seo);
        assert_eq!(req.prior_suggestions, Some(vec!["one".to_string()]));

        let short: SuggestionAction = serde_json::from_str("\"regenerate\"").unwrap();
        assert_eq!(short, SuggestionAction::Regenerate);
    }

    #[test]
    fn test_parse_numbered_list() {
        let text = "Here are my ideas:\n1. Start with a vivid anecdote to hook readers.\n2. Break the long middle section into subheadings.\n3. End with a clear call to action for readers.";
        let parsed = parse_suggestions(text);
        assert_eq!(
            parsed,
            vec![
                "Start with a vivid anecdote to hook readers.",
                "Break the long middle section into subheadings.",
                "End with a clear call to action for readers.",
            ]
        );
    }

    #[test]
    fn test_parse_caps_at_three() {
        let text = "1. First suggestion is long enough.\n2. Second suggestion is long enough.\n3. Third suggestion is long enough.\n4. Fourth suggestion is long enough.";
        assert_eq!(parse_suggestions(text).len(), 3);
    }

    #[test]
    fn test_parse_falls_back_to_sentences() {
        let text = "Consider tightening the opening paragraph! Add concrete examples from your own work? Short";
        let parsed = parse_suggestions(text);
        assert_eq!(
            parsed,
            vec![
                "Consider tightening the opening paragraph.",
                "Add concrete examples from your own work.",
            ]
        );
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_suggestions("").is_empty());
    }

    #[test]
    fn test_build_prompt_regenerate_lists_prior() {
        let req = SuggestionRequest::new(SuggestionAction::Regenerate, "", "")
            .with_prior(vec!["Use metaphors".into(), "Shorten intro".into()]);
        let prompt = build_prompt(&req);
        assert!(prompt.contains("Avoid these previous suggestions: Use metaphors, Shorten intro"));
        assert!(prompt.contains("Title: Untitled"));
        assert!(prompt.contains("Content: No content yet"));
    }

    #[test]
    fn test_apply_suggestion_labels() {
        assert!(apply_suggestion("Make the title punchier", "Body").ends_with("<!-- AI Suggestion for Title: Make the title punchier -->\n"));
        assert!(apply_suggestion("Split this paragraph", "Body").contains("[Apply this suggestion here]"));
        assert!(apply_suggestion("Add a transition", "Body").contains("<!-- Transition Suggestion: Add a transition -->"));
        let tip = apply_suggestion("Use active voice", "Body");
        assert!(tip.starts_with("Body\n\n"));
        assert!(tip.contains("<!-- AI Writing Tip: Use active voice -->"));
    }

    #[test]
    fn test_error_response_means_no_suggestions() {
        let resp: SuggestionResponse = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert!(resp.into_suggestions().is_empty());

        let resp: SuggestionResponse =
            serde_json::from_str(r#"{"suggestions":["a","b"],"action":"generate"}"#).unwrap();
        assert_eq!(resp.into_suggestions(), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_api_key() {
        let result = OpenAiSuggestionClient::new(AssistantConfig::default(), "");
        assert!(matches!(result, Err(AssistantError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_suggest_calls_api_and_parses() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "1. Open with a question to engage readers.\n2. Add a concrete example after the intro.\n3. Trim the conclusion to two sentences.",
            )))
            .mount(&mock_server)
            .await;

        let client = OpenAiSuggestionClient::new(test_config(mock_server.uri()), "test-key").unwrap();
        let req = SuggestionRequest::new(SuggestionAction::Generate, "My post", "Some content");
        let suggestions = client.suggest(&req).await.unwrap();

        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0], "Open with a question to engage readers.");
    }

    #[tokio::test]
    async fn test_suggest_retries_then_succeeds() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "1. First improvement suggestion here.\n2. Second improvement suggestion here.\n3. Third improvement suggestion here.",
            )))
            .mount(&mock_server)
            .await;

        let client = OpenAiSuggestionClient::new(test_config(mock_server.uri()), "k").unwrap();
        let req = SuggestionRequest::new(SuggestionAction::Seo, "t", "c");
        assert_eq!(client.suggest(&req).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_suggest_exhausts_retries_on_500() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "Internal server error" }
            })))
            .mount(&mock_server)
            .await;

        let client = OpenAiSuggestionClient::new(test_config(mock_server.uri()), "k").unwrap();
        let req = SuggestionRequest::new(SuggestionAction::Generate, "t", "c");

        match client.suggest(&req).await {
            Err(AssistantError::RetryExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.contains("Internal server error"));
            }
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
        assert!(suggestions_or_empty(&client, &req).await.is_empty());
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = OpenAiSuggestionClient::new(test_config(mock_server.uri()), "bad").unwrap();
        let req = SuggestionRequest::new(SuggestionAction::Generate, "t", "c");

        match client.suggest(&req).await {
            Err(AssistantError::Api { code, message }) => {
                assert_eq!(code, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_completion_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = OpenAiSuggestionClient::new(test_config(mock_server.uri()), "k").unwrap();
        let result = client.complete("prompt").await;
        assert!(matches!(result, Err(AssistantError::MissingCompletion)));
    }

    #[test]
    fn test_transient_classification() {
        let api = |code| AssistantError::Api {
            code,
            message: String::new(),
        };
        assert!(api(429).is_transient());
        assert!(api(503).is_transient());
        assert!(!api(400).is_transient());
        assert!(!api(401).is_transient());
        assert!(!AssistantError::MissingCompletion.is_transient());
    }
}
