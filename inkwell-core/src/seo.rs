//! Rule-based SEO scoring for a draft.
//!
//! Four rules, 25 points each:
//! - title between 30 and 60 characters
//! - meta description between 120 and 160 characters
//! - at least 3 keywords
//! - content of at least 300 characters

use serde::{Deserialize, Serialize};

pub const TITLE_RANGE: (usize, usize) = (30, 60);
pub const META_RANGE: (usize, usize) = (120, 160);
pub const MIN_KEYWORDS: usize = 3;
pub const MIN_CONTENT_CHARS: usize = 300;
pub const RULE_POINTS: u8 = 25;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeoGrade {
    Good,
    Fair,
    Poor,
}

impl SeoGrade {
    pub fn from_score(score: u8) -> Self {
        if score >= 75 {
            SeoGrade::Good
        } else if score >= 50 {
            SeoGrade::Fair
        } else {
            SeoGrade::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoReport {
    pub score: u8,
    pub grade: SeoGrade,
    pub title_length: bool,
    pub meta_description: bool,
    pub keywords: bool,
    pub content_length: bool,
    pub keyword_count: usize,
}

fn within(len: usize, (min, max): (usize, usize)) -> bool {
    len >= min && len <= max
}

pub fn score(input: &SeoInput) -> SeoReport {
    let title_length = within(input.title.chars().count(), TITLE_RANGE);
    let meta_description = within(input.meta_description.chars().count(), META_RANGE);
    let keywords = input.keywords.len() >= MIN_KEYWORDS;
    let content_length = input.content.chars().count() >= MIN_CONTENT_CHARS;

    let score = [title_length, meta_description, keywords, content_length]
        .iter()
        .filter(|passed| **passed)
        .count() as u8
        * RULE_POINTS;

    SeoReport {
        score,
        grade: SeoGrade::from_score(score),
        title_length,
        meta_description,
        keywords,
        content_length,
        keyword_count: input.keywords.len(),
    }
}

/// Ordered, duplicate-free keyword list as edited in the SEO panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trimmed keyword. Returns false for blanks and duplicates.
    pub fn add(&mut self, keyword: &str) -> bool {
        let keyword = keyword.trim();
        if keyword.is_empty() || self.0.iter().any(|k| k == keyword) {
            return false;
        }
        self.0.push(keyword.to_string());
        true
    }

    pub fn remove(&mut self, keyword: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|k| k != keyword);
        self.0.len() != before
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}
