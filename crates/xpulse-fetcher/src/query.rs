//! Subjects and the advanced-search query built from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use xpulse_core::FetchedItem;

/// What one fetch is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Subject {
    /// Timeline of one author, without `@`.
    Author(String),
    /// Posts looked up directly by id.
    Posts(Vec<String>),
    /// Free-text keyword search.
    Keywords(String),
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Author(handle) => write!(f, "@{handle}"),
            Subject::Posts(ids) => write!(f, "{} post(s)", ids.len()),
            Subject::Keywords(text) => write!(f, "\"{text}\""),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// When `false` the query excludes replies.
    pub include_replies: bool,
    /// Extra free text every result must match.
    pub content: Option<String>,
    /// Handle every result must mention.
    pub mention: Option<String>,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub min_impressions: Option<u64>,
    /// Minimum engagement rate, in percent.
    pub min_engagement_rate: Option<f64>,
}

impl SearchFilters {
    /// Post-fetch thresholds. The query cannot express these, so every
    /// fetch path applies them to the items it receives.
    ///
    /// An item without impressions fails any positive engagement threshold.
    #[must_use]
    pub fn accepts(&self, item: &FetchedItem) -> bool {
        if let Some(min) = self.min_impressions {
            if item.metrics.impressions < min {
                return false;
            }
        }
        match self.min_engagement_rate {
            Some(min) if min > 0.0 => item
                .metrics
                .engagement_rate()
                .is_some_and(|rate| rate >= min),
            _ => true,
        }
    }
}

/// Builds the advanced-search query for `subject`.
///
/// Terms are space-joined, which the API treats as AND. Returns `None` for
/// [`Subject::Posts`], which is fetched by id instead.
#[must_use]
pub fn build_query(subject: &Subject, filters: &SearchFilters) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();
    match subject {
        Subject::Author(handle) => {
            terms.push(format!("from:{}", handle.trim_start_matches('@')));
        }
        Subject::Keywords(text) => terms.push(text.trim().to_owned()),
        Subject::Posts(_) => return None,
    }

    if !filters.include_replies {
        terms.push("-filter:replies".to_owned());
    }
    if let Some(content) = filters.content.as_deref().map(str::trim) {
        if !content.is_empty() {
            terms.push(content.to_owned());
        }
    }
    if let Some(mention) = filters.mention.as_deref().map(str::trim) {
        let mention = mention.trim_start_matches('@');
        if !mention.is_empty() {
            terms.push(format!("@{mention}"));
        }
    }
    if let Some(since) = filters.since {
        terms.push(format!("since:{}", since.format("%Y-%m-%d")));
    }
    if let Some(until) = filters.until {
        terms.push(format!("until:{}", until.format("%Y-%m-%d")));
    }

    Some(terms.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xpulse_core::ItemMetrics;

    fn item_with(metrics: ItemMetrics) -> FetchedItem {
        FetchedItem {
            subject_id: "1".to_owned(),
            author_username: "alice".to_owned(),
            text: String::new(),
            created_at: None,
            metrics,
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn author_query_excludes_replies_by_default() {
        let q = build_query(&Subject::Author("alice".to_owned()), &SearchFilters::default());
        assert_eq!(q.as_deref(), Some("from:alice -filter:replies"));
    }

    #[test]
    fn all_terms_are_joined_in_order() {
        let filters = SearchFilters {
            include_replies: true,
            content: Some("rust".to_owned()),
            mention: Some("@bob".to_owned()),
            since: NaiveDate::from_ymd_opt(2024, 1, 2),
            until: NaiveDate::from_ymd_opt(2024, 2, 3),
            ..SearchFilters::default()
        };
        let q = build_query(&Subject::Keywords(" async runtime ".to_owned()), &filters);
        assert_eq!(
            q.as_deref(),
            Some("async runtime rust @bob since:2024-01-02 until:2024-02-03")
        );
    }

    #[test]
    fn posts_have_no_query() {
        let q = build_query(&Subject::Posts(vec!["1".to_owned()]), &SearchFilters::default());
        assert!(q.is_none());
    }

    #[test]
    fn impression_threshold_is_inclusive() {
        let filters = SearchFilters {
            min_impressions: Some(100),
            ..SearchFilters::default()
        };
        let at = item_with(ItemMetrics {
            impressions: 100,
            ..ItemMetrics::default()
        });
        let below = item_with(ItemMetrics {
            impressions: 99,
            ..ItemMetrics::default()
        });
        assert!(filters.accepts(&at));
        assert!(!filters.accepts(&below));
    }

    #[test]
    fn engagement_threshold_rejects_items_without_impressions() {
        let filters = SearchFilters {
            min_engagement_rate: Some(1.0),
            ..SearchFilters::default()
        };
        let no_views = item_with(ItemMetrics {
            likes: 50,
            ..ItemMetrics::default()
        });
        let engaged = item_with(ItemMetrics {
            likes: 2,
            impressions: 100,
            ..ItemMetrics::default()
        });
        let quiet = item_with(ItemMetrics {
            likes: 0,
            impressions: 100,
            ..ItemMetrics::default()
        });
        assert!(!filters.accepts(&no_views));
        assert!(filters.accepts(&engaged));
        assert!(!filters.accepts(&quiet));
    }

    #[test]
    fn no_thresholds_accept_everything() {
        assert!(SearchFilters::default().accepts(&item_with(ItemMetrics::default())));
    }
}
