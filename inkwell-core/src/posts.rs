//! Client for the remote posts data service (PostgREST-style REST API).
//!
//! Every call is a single attempt. Failures are reported to the caller and
//! retried only when the user asks again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::PostsConfig;
use crate::models::{LikeOutcome, NewPost, Post, PostFilter};

#[derive(Error, Debug)]
pub enum PostServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Service returned no rows")]
    EmptyResponse,

    #[error("Invalid input: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait PostService: Send + Sync {
    async fn create_post(&self, post: NewPost) -> Result<Post, PostServiceError>;

    /// Posts matching `filter`, newest first.
    async fn fetch_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, PostServiceError>;

    /// Toggle `user_id`'s like on `post_id`.
    async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<LikeOutcome, PostServiceError>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RestPostClient {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestPostClient {
    pub fn new(config: &PostsConfig, api_key: impl Into<String>) -> Result<Self, PostServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: None,
        })
    }

    /// Build from config, reading the key from `INKWELL_POSTS_API_KEY`.
    pub fn from_env(config: &PostsConfig) -> Result<Self, PostServiceError> {
        let api_key = std::env::var("INKWELL_POSTS_API_KEY").unwrap_or_default();
        Self::new(config, api_key)
    }

    /// Attach the signed-in user's session token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub(crate) fn authed(&self, builder: RequestBuilder) -> Result<RequestBuilder, PostServiceError> {
        let token = self.access_token.as_ref().ok_or(PostServiceError::NotAuthenticated)?;
        Ok(builder.header("apikey", &self.api_key).bearer_auth(token))
    }

    pub(crate) fn anon(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);
        builder.header("apikey", &self.api_key).bearer_auth(token)
    }

    pub(crate) async fn check(response: Response) -> Result<Response, PostServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);
        tracing::error!(code = status.as_u16(), message = %message, "Post service error");
        Err(PostServiceError::Api {
            code: status.as_u16(),
            message,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Call a stored procedure with a JSON argument object.
    pub(crate) async fn rpc(&self, function: &str, args: serde_json::Value) -> Result<(), PostServiceError> {
        let url = self.url(&format!("rpc/{}", function));
        let request = self.authed(self.client.post(&url))?.json(&args);
        Self::check(request.send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl PostService for RestPostClient {
    async fn create_post(&self, post: NewPost) -> Result<Post, PostServiceError> {
        let url = format!("{}/posts", self.base_url);
        let request = self
            .authed(self.client.post(&url))?
            .header("Prefer", "return=representation")
            .json(&post);

        let response = Self::check(request.send().await?).await?;
        let rows: Vec<Post> = response.json().await?;
        let created = rows.into_iter().next().ok_or(PostServiceError::EmptyResponse)?;

        tracing::info!(id = %created.id, published = created.published, "Post created");
        Ok(created)
    }

    async fn fetch_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, PostServiceError> {
        let url = format!("{}/posts", self.base_url);

        let mut query: Vec<(&str, String)> = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(published) = filter.published {
            query.push(("published", format!("eq.{}", published)));
        }
        if let Some(user_id) = filter.user_id {
            query.push(("user_id", format!("eq.{}", user_id)));
        }
        if let Some(category) = &filter.category {
            query.push(("category", format!("eq.{}", category)));
        }
        if let Some(expression) = filter.search_expression() {
            query.push(("or", expression));
        }
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(offset) = filter.offset {
            query.push(("offset", offset.to_string()));
        }

        let request = self.anon(self.client.get(&url)).query(&query);
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<LikeOutcome, PostServiceError> {
        let url = format!("{}/post_likes", self.base_url);
        let post_filter = format!("eq.{}", post_id);
        let user_filter = format!("eq.{}", user_id);

        let lookup = self
            .authed(self.client.get(&url))?
            .query(&[("select", "id"), ("post_id", post_filter.as_str()), ("user_id", user_filter.as_str())]);
        let existing: Vec<serde_json::Value> = Self::check(lookup.send().await?).await?.json().await?;

        if existing.is_empty() {
            let insert = self
                .authed(self.client.post(&url))?
                .json(&serde_json::json!({ "post_id": post_id, "user_id": user_id }));
            Self::check(insert.send().await?).await?;
            self.rpc("increment_likes", serde_json::json!({ "post_id": post_id })).await?;
            tracing::debug!(post = %post_id, "Post liked");
            Ok(LikeOutcome::Liked)
        } else {
            let delete = self
                .authed(self.client.delete(&url))?
                .query(&[("post_id", &post_filter), ("user_id", &user_filter)]);
            Self::check(delete.send().await?).await?;
            self.rpc("decrement_likes", serde_json::json!({ "post_id": post_id })).await?;
            tracing::debug!(post = %post_id, "Post unliked");
            Ok(LikeOutcome::Unliked)
        }
    }
}
