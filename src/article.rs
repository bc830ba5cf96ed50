use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_AUTHOR: &str = "Tavvy Atlas Team";
pub const DEFAULT_TEMPLATE: &str = "city_guide";
pub const DEFAULT_STATUS: &str = "published";
pub const WORDS_PER_MINUTE: usize = 200;

/// Closed set of content block kinds the Atlas reader knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Heading,
    Paragraph,
    Image,
    List,
    BulletList,
    NumberedList,
    PlaceCard,
    Itinerary,
    ItineraryDay,
    Callout,
    Checklist,
    Quote,
    Divider,
}

impl BlockType {
    pub const ALL: [BlockType; 13] = [
        BlockType::Heading,
        BlockType::Paragraph,
        BlockType::Image,
        BlockType::List,
        BlockType::BulletList,
        BlockType::NumberedList,
        BlockType::PlaceCard,
        BlockType::Itinerary,
        BlockType::ItineraryDay,
        BlockType::Callout,
        BlockType::Checklist,
        BlockType::Quote,
        BlockType::Divider,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::Heading => "heading",
            BlockType::Paragraph => "paragraph",
            BlockType::Image => "image",
            BlockType::List => "list",
            BlockType::BulletList => "bullet_list",
            BlockType::NumberedList => "numbered_list",
            BlockType::PlaceCard => "place_card",
            BlockType::Itinerary => "itinerary",
            BlockType::ItineraryDay => "itinerary_day",
            BlockType::Callout => "callout",
            BlockType::Checklist => "checklist",
            BlockType::Quote => "quote",
            BlockType::Divider => "divider",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

/// Why a single content block was rejected. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("Block {index}: missing 'type' field")]
    MissingType { index: usize },

    #[error("Block {index}: invalid type '{tag}'")]
    InvalidType { index: usize, tag: String },
}

/// Check every block's `type` against [`BlockType`]. One error per bad block.
pub fn validate_blocks(blocks: &[Value]) -> Vec<BlockError> {
    blocks
        .iter()
        .enumerate()
        .filter_map(|(i, block)| {
            let index = i + 1;
            match block.get("type") {
                None => Some(BlockError::MissingType { index }),
                Some(Value::String(tag)) if BlockType::from_tag(tag).is_some() => None,
                Some(Value::String(tag)) => Some(BlockError::InvalidType {
                    index,
                    tag: tag.clone(),
                }),
                Some(other) => Some(BlockError::InvalidType {
                    index,
                    tag: other.to_string(),
                }),
            }
        })
        .collect()
}

/// Whitespace-separated words in a block's `text`. Absent text counts as empty;
/// any other value is counted through its display form, so `null` is one word
/// and `["a","b"]` is two.
fn block_words(block: &Value) -> usize {
    match block.get("text") {
        None => 0,
        Some(Value::String(s)) => s.split_whitespace().count(),
        Some(other) => display_text(other).split_whitespace().count(),
    }
}

/// `None`/`True`/`False` for scalars, `['a', 'b']` and `{'k': v}` for containers.
fn display_text(v: &Value) -> String {
    fn nested(v: &Value) -> String {
        match v {
            Value::String(s) => format!("'{}'", s.escape_debug()),
            other => display_text(other),
        }
    }
    match v {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(nested).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{}': {}", k.escape_debug(), nested(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// `max(1, words / 200)` over the `text` of every block.
pub fn estimate_read_time(blocks: &[Value]) -> u32 {
    let words: usize = blocks.iter().map(block_words).sum();
    let minutes = (words / WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Where a keyword list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordSource {
    /// The cell held a JSON array; non-string elements keep their JSON rendering.
    JsonArray,
    /// The cell was split on commas, either directly or because the JSON attempt failed.
    Delimited { json_attempted: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keywords {
    pub values: Vec<String>,
    pub source: KeywordSource,
}

impl Keywords {
    /// Cells starting with `[` are tried as a JSON array first; anything else,
    /// and any cell whose JSON attempt fails, is split on `,` verbatim.
    pub fn parse(raw: &str) -> Self {
        let json_attempted = raw.starts_with('[');
        if json_attempted {
            if let Ok(items) = serde_json::from_str::<Vec<Value>>(raw) {
                let values = items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect();
                return Keywords {
                    values,
                    source: KeywordSource::JsonArray,
                };
            }
        }
        Keywords {
            values: raw.split(',').map(str::to_string).collect(),
            source: KeywordSource::Delimited { json_attempted },
        }
    }
}

/// `true`, `1` or `yes` in any case; everything else is false.
pub fn parse_truthy(raw: &str) -> bool {
    ["true", "1", "yes"]
        .iter()
        .any(|t| raw.eq_ignore_ascii_case(t))
}

/// One row of `atlas_articles` as submitted to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    /// Legacy column still read by older app builds; mirrors `excerpt`.
    pub content: String,
    pub content_blocks: Vec<Value>,
    pub section_images: Option<Value>,
    pub author_name: String,
    /// Kept as the store returned it; uuid strings in practice.
    pub category_id: Option<Value>,
    pub read_time_minutes: u32,
    pub article_template_type: String,
    pub cover_image_url: Option<String>,
    pub seo_meta_description: Option<String>,
    pub seo_keywords: Option<Vec<String>>,
    pub is_featured: bool,
    pub status: String,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl ArticleRecord {
    /// Stamp a fresh id and creation/publication time for a first insert.
    pub fn prepare_insert(&mut self, now: DateTime<Utc>) {
        self.id = Some(Uuid::new_v4());
        self.created_at = Some(now);
        self.published_at = Some(now);
    }

    /// JSON payload for an update: the slug is the filter, never a column to write.
    pub fn update_payload(&self) -> Result<Value, serde_json::Error> {
        let mut payload = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut payload {
            map.remove("slug");
        }
        Ok(payload)
    }
}
