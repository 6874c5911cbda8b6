use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public engagement counters reported for a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetrics {
    pub likes: u64,
    pub replies: u64,
    pub retweets: u64,
    pub impressions: u64,
    pub bookmarks: u64,
    /// Not every endpoint reports quotes.
    pub quotes: Option<u64>,
}

impl ItemMetrics {
    /// Likes, replies, retweets, and quotes combined.
    #[must_use]
    pub fn engagements(&self) -> u64 {
        self.likes
            .saturating_add(self.replies)
            .saturating_add(self.retweets)
            .saturating_add(self.quotes.unwrap_or(0))
    }

    /// Engagements as a percentage of impressions. `None` when there are no
    /// impressions to divide by.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn engagement_rate(&self) -> Option<f64> {
        if self.impressions == 0 {
            return None;
        }
        Some(self.engagements() as f64 / self.impressions as f64 * 100.0)
    }
}

/// One post returned by the content API, normalized for storage.
///
/// Stored keyed by `(request_id, subject_id)`, so fetching the same post
/// twice for a request overwrites rather than duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedItem {
    /// Post id.
    pub subject_id: String,
    pub author_username: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub metrics: ItemMetrics,
    /// The API object as received.
    pub raw: serde_json::Value,
}

impl FetchedItem {
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "https://x.com/{}/status/{}",
            self.author_username, self.subject_id
        )
    }
}
