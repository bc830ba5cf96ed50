//! CSV row -> [`ArticleRecord`] with per-row error collection.
//!
//! Two failure classes exist. A missing required field or an unusable
//! `content_blocks` cell stops the row: no record, only errors. Everything
//! else (bad block types, bad `section_images`, unknown category, bad
//! `read_time_minutes`) is reported but the record is still produced.
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::article::{
    estimate_read_time, parse_truthy, validate_blocks, ArticleRecord, BlockError, KeywordSource,
    Keywords, DEFAULT_AUTHOR, DEFAULT_STATUS, DEFAULT_TEMPLATE,
};
use crate::categories::CategoryMap;

/// One CSV record, keyed by header name. Unknown columns are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CsvRow {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub author: Option<String>,
    pub excerpt: Option<String>,
    pub category_slug: Option<String>,
    pub content_blocks: Option<String>,
    pub section_images: Option<String>,
    pub cover_image_url: Option<String>,
    pub read_time_minutes: Option<String>,
    pub article_template_type: Option<String>,
    pub seo_meta_description: Option<String>,
    pub seo_keywords: Option<String>,
    pub is_featured: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowErrorKind {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid content_blocks JSON - {0}")]
    InvalidBlocksJson(String),

    #[error("content_blocks must be a JSON array")]
    BlocksNotArray,

    #[error("content_blocks is empty")]
    BlocksEmpty,

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error("invalid section_images JSON - {0}")]
    InvalidSectionImages(String),

    #[error("unknown category_slug '{0}'")]
    UnknownCategory(String),

    #[error("invalid read_time_minutes '{0}'")]
    InvalidReadTime(String),

    #[error("unreadable CSV record - {0}")]
    Unreadable(String),
}

impl RowErrorKind {
    /// Errors that prevent a record from being produced.
    pub fn is_fatal_for_row(&self) -> bool {
        matches!(
            self,
            RowErrorKind::MissingField(_)
                | RowErrorKind::InvalidBlocksJson(_)
                | RowErrorKind::BlocksNotArray
                | RowErrorKind::BlocksEmpty
                | RowErrorKind::Unreadable(_)
        )
    }
}

/// A validation problem tied to its 1-based CSV line (the header is line 1).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Row {row}: {kind}")]
pub struct RowError {
    pub row: usize,
    pub kind: RowErrorKind,
}

impl RowError {
    pub fn new(row: usize, kind: impl Into<RowErrorKind>) -> Self {
        Self {
            row,
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub article: Option<ArticleRecord>,
    pub errors: Vec<RowError>,
}

const REQUIRED: [&str; 3] = ["title", "slug", "content_blocks"];

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

impl CsvRow {
    fn required(&self, field: &str) -> Option<&str> {
        match field {
            "title" => present(&self.title),
            "slug" => present(&self.slug),
            "content_blocks" => present(&self.content_blocks),
            _ => None,
        }
    }
}

/// Parse `content_blocks`. Errors here stop the row.
fn parse_blocks(raw: &str) -> Result<Vec<Value>, RowErrorKind> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(blocks)) if blocks.is_empty() => Err(RowErrorKind::BlocksEmpty),
        Ok(Value::Array(blocks)) => Ok(blocks),
        Ok(_) => Err(RowErrorKind::BlocksNotArray),
        Err(e) => Err(RowErrorKind::InvalidBlocksJson(e.to_string())),
    }
}

/// An explicit positive count wins; `0` or an absent cell means derive it.
fn explicit_read_time(raw: Option<&str>) -> Result<Option<u32>, RowErrorKind> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<i64>() {
        Ok(0) => Ok(None),
        Ok(n) if n > 0 => Ok(Some(u32::try_from(n).unwrap_or(u32::MAX))),
        _ => Err(RowErrorKind::InvalidReadTime(raw.to_string())),
    }
}

/// Turn one CSV record into an article. `row_num` is the CSV line number
/// used in error messages; `now` becomes the record's `updated_at`.
pub fn parse_row(
    row: &CsvRow,
    row_num: usize,
    categories: &CategoryMap,
    now: DateTime<Utc>,
) -> ParsedRow {
    let mut errors: Vec<RowError> = REQUIRED
        .iter()
        .filter(|f| row.required(f).is_none())
        .map(|&f| RowError::new(row_num, RowErrorKind::MissingField(f)))
        .collect();

    let (Some(title), Some(slug), Some(raw_blocks)) = (
        row.required("title"),
        row.required("slug"),
        row.required("content_blocks"),
    ) else {
        return ParsedRow {
            article: None,
            errors,
        };
    };

    let content_blocks = match parse_blocks(raw_blocks) {
        Ok(blocks) => blocks,
        Err(kind) => {
            errors.push(RowError::new(row_num, kind));
            return ParsedRow {
                article: None,
                errors,
            };
        }
    };
    errors.extend(
        validate_blocks(&content_blocks)
            .into_iter()
            .map(|e| RowError::new(row_num, e)),
    );

    let section_images = match present(&row.section_images) {
        None => None,
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                errors.push(RowError::new(
                    row_num,
                    RowErrorKind::InvalidSectionImages(e.to_string()),
                ));
                None
            }
        },
    };

    let seo_keywords = present(&row.seo_keywords).map(|raw| {
        let keywords = Keywords::parse(raw);
        if matches!(
            keywords.source,
            KeywordSource::Delimited {
                json_attempted: true
            }
        ) {
            debug!(
                row = row_num,
                "seo_keywords looked like JSON but did not parse; split on commas"
            );
        }
        keywords.values
    });

    let category_id = match present(&row.category_slug) {
        None => None,
        Some(cat) => match categories.get(cat) {
            Some(id) => Some(id.clone()),
            None => {
                errors.push(RowError::new(
                    row_num,
                    RowErrorKind::UnknownCategory(cat.to_string()),
                ));
                None
            }
        },
    };

    let read_time_minutes = match explicit_read_time(present(&row.read_time_minutes)) {
        Ok(Some(n)) => n,
        Ok(None) => estimate_read_time(&content_blocks),
        Err(kind) => {
            errors.push(RowError::new(row_num, kind));
            estimate_read_time(&content_blocks)
        }
    };

    let excerpt = row.excerpt.clone().unwrap_or_default();
    let article = ArticleRecord {
        id: None,
        title: title.to_string(),
        slug: slug.to_string(),
        content: excerpt.clone(),
        excerpt,
        content_blocks,
        section_images,
        author_name: present(&row.author).unwrap_or(DEFAULT_AUTHOR).to_string(),
        category_id,
        read_time_minutes,
        article_template_type: present(&row.article_template_type)
            .unwrap_or(DEFAULT_TEMPLATE)
            .to_string(),
        cover_image_url: present(&row.cover_image_url).map(str::to_string),
        seo_meta_description: present(&row.seo_meta_description).map(str::to_string),
        seo_keywords,
        is_featured: row.is_featured.as_deref().map(parse_truthy).unwrap_or(false),
        status: present(&row.status).unwrap_or(DEFAULT_STATUS).to_string(),
        updated_at: now,
        created_at: None,
        published_at: None,
    };

    ParsedRow {
        article: Some(article),
        errors,
    }
}
