//! The wire record and the validated item built from it.
//!
//! Sources hand back [`RawRecord`]s exactly as the upstream API delivers them.
//! Converting into a [`NewsItem`] is all-or-nothing: a record that is missing
//! any required field is dropped, never filled in with defaults.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use serde::Deserialize;

use crate::error::{FeedError, Result};

/// Timestamp layout used by the upstream API (always UTC, no offset suffix).
const PUBLISHED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One entry of a page, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_date: Option<String>,
    /// Short slug of the article; unused by the client.
    pub url: Option<String>,
    pub full_url: Option<String>,
    pub title_image_url: Option<String>,
    pub category_type: Option<String>,
}

/// A fully validated news entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    /// Unique within the feed.
    pub id: i64,
    /// Never empty.
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    /// Thumbnail locator, used as the image cache key.
    pub image_url: String,
    /// Full article locator, handed to the router.
    pub detail_url: String,
    pub category: String,
}

impl TryFrom<RawRecord> for NewsItem {
    type Error = FeedError;

    fn try_from(raw: RawRecord) -> Result<Self> {
        let id = raw.id;
        let missing = |field| FeedError::Validation { id, field };

        let title = required(raw.title).ok_or_else(|| missing("title"))?;
        let description = raw.description.ok_or_else(|| missing("description"))?;
        let category = raw.category_type.ok_or_else(|| missing("categoryType"))?;
        let detail_url = required(raw.full_url).ok_or_else(|| missing("fullUrl"))?;
        let published_at = raw
            .published_date
            .as_deref()
            .and_then(parse_published)
            .ok_or_else(|| missing("publishedDate"))?;
        let image_url = required(raw.title_image_url).ok_or_else(|| missing("titleImageUrl"))?;

        Ok(NewsItem {
            id,
            title,
            description,
            published_at,
            image_url,
            detail_url,
            category,
        })
    }
}

/// Keep only records that validate, preserving page order.
pub fn validate_page(records: Vec<RawRecord>) -> Vec<NewsItem> {
    records
        .into_iter()
        .filter_map(|raw| match NewsItem::try_from(raw) {
            Ok(item) => Some(item),
            Err(e) => {
                debug!("dropping record: {e}");
                None
            }
        })
        .collect()
}

/// Parse the upstream timestamp as UTC.
pub fn parse_published(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, PUBLISHED_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
