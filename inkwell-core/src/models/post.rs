use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Average reading speed used for `reading_time`, in words per minute.
pub const WORDS_PER_MINUTE: usize = 200;

/// Posts per page on the discover feed.
pub const DISCOVER_PAGE_SIZE: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub published: bool,
    pub reading_time: Option<i32>,
    #[serde(default)]
    pub likes_count: i64,
    #[serde(default)]
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
}

/// Insert payload for the `posts` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub published: bool,
    pub user_id: Uuid,
    pub reading_time: i32,
}

impl NewPost {
    pub fn new(user_id: Uuid, title: impl Into<String>, content: impl Into<String>, published: bool) -> Self {
        let content = content.into();
        let reading_time = reading_time_minutes(&content);
        Self {
            title: title.into(),
            content,
            excerpt: None,
            category: None,
            tags: None,
            published,
            user_id,
            reading_time,
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }
}

/// Minutes to read `content`, rounded up, never less than one.
pub fn reading_time_minutes(content: &str) -> i32 {
    let words = content.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as i32
}

/// Query options for listing posts. Results are always newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    /// `Some(true)` lists only published posts (the public feed).
    pub published: Option<bool>,
    pub user_id: Option<Uuid>,
    pub category: Option<String>,
    /// Case-insensitive match against title, content or excerpt.
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PostFilter {
    pub fn published_feed() -> Self {
        Self {
            published: Some(true),
            ..Self::default()
        }
    }

    /// One page of the discover feed. A blank search means no search.
    pub fn discover(page: u32, search: &str) -> Self {
        let search = search.trim();
        Self {
            search: (!search.is_empty()).then(|| search.to_string()),
            limit: Some(DISCOVER_PAGE_SIZE),
            offset: Some(page * DISCOVER_PAGE_SIZE),
            ..Self::published_feed()
        }
    }

    /// PostgREST `or` expression for the search term, if any.
    ///
    /// Characters that delimit the expression are dropped from the term.
    pub fn search_expression(&self) -> Option<String> {
        let term: String = self
            .search
            .as_deref()?
            .chars()
            .filter(|c| !matches!(*c, ',' | '(' | ')' | '"' | '*' | '\\'))
            .collect();
        let term = term.trim();
        if term.is_empty() {
            return None;
        }
        Some(format!(
            "(title.ilike.*{t}*,content.ilike.*{t}*,excerpt.ilike.*{t}*)",
            t = term
        ))
    }
}

/// Result of toggling a like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeOutcome {
    Liked,
    Unliked,
}
