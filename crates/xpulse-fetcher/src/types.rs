//! Wire types for the content API and their conversion into
//! [`FetchedItem`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use xpulse_core::{FetchedItem, ItemMetrics};

use crate::error::FetchError;

/// One page of search results as sent by the API.
///
/// The array key is `items` in newer responses and `tweets` in older ones;
/// the cursor fields come in both camel and snake case.
#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchPage {
    #[serde(default, alias = "tweets")]
    pub items: Vec<Value>,
    #[serde(default, rename = "hasNextPage", alias = "has_next_page")]
    pub has_next_page: bool,
    #[serde(default, rename = "nextCursor", alias = "next_cursor")]
    pub next_cursor: Option<String>,
}

/// Lookup responses are either a bare array or wrapped in `{tweets: [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawLookup {
    Flat(Vec<Value>),
    Wrapped {
        #[serde(alias = "items")]
        tweets: Vec<Value>,
    },
}

impl RawLookup {
    pub(crate) fn into_values(self) -> Vec<Value> {
        match self {
            RawLookup::Flat(values) | RawLookup::Wrapped { tweets: values } => values,
        }
    }
}

/// A search result page converted to domain items.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub items: Vec<FetchedItem>,
    pub has_next_page: bool,
    /// `None` when the API sent no cursor or an empty one.
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPost {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    view_count: u64,
    #[serde(default)]
    bookmark_count: u64,
    #[serde(default)]
    quote_count: Option<u64>,
    #[serde(default)]
    author: Option<ApiAuthor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAuthor {
    #[serde(default, alias = "username", alias = "screen_name")]
    user_name: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// Accepts the legacy `Tue Dec 10 07:00:30 +0000 2024` format and RFC 3339.
pub(crate) fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Converts one raw API object, keeping the object itself as `raw`.
pub(crate) fn item_from_value(raw: Value, context: &str) -> Result<FetchedItem, FetchError> {
    let post: ApiPost =
        serde_json::from_value(raw.clone()).map_err(|source| FetchError::Deserialize {
            context: context.to_owned(),
            source,
        })?;

    let created_at = post.created_at.as_deref().and_then(|s| {
        let parsed = parse_created_at(s);
        if parsed.is_none() {
            tracing::debug!(id = %post.id, created_at = s, "unrecognized createdAt format");
        }
        parsed
    });

    Ok(FetchedItem {
        subject_id: post.id,
        author_username: post.author.map(|a| a.user_name).unwrap_or_default(),
        text: post.text,
        created_at,
        metrics: ItemMetrics {
            likes: post.like_count,
            replies: post.reply_count,
            retweets: post.retweet_count,
            impressions: post.view_count,
            bookmarks: post.bookmark_count,
            quotes: post.quote_count,
        },
        raw,
    })
}

/// Converts every object of a page. Objects that do not decode are dropped
/// so one bad post does not cost the rest of the page.
pub(crate) fn items_from_values(values: Vec<Value>, context: &str) -> Vec<FetchedItem> {
    values
        .into_iter()
        .filter_map(|v| match item_from_value(v, context) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable post");
                None
            }
        })
        .collect()
}
