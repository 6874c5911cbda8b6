//! Database operations for `fetched_items`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use xpulse_core::{FetchedItem, ItemMetrics};

use crate::DbError;

/// A row from the `fetched_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FetchedItemRow {
    pub request_id: Uuid,
    pub subject_id: String,
    pub author_username: String,
    pub text: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub likes: i64,
    pub replies: i64,
    pub retweets: i64,
    pub impressions: i64,
    pub bookmarks: i64,
    pub quotes: Option<i64>,
    pub raw: serde_json::Value,
}

impl From<FetchedItemRow> for FetchedItem {
    fn from(row: FetchedItemRow) -> Self {
        Self {
            subject_id: row.subject_id,
            author_username: row.author_username,
            text: row.text,
            created_at: row.posted_at,
            metrics: ItemMetrics {
                likes: count_from_db(row.likes),
                replies: count_from_db(row.replies),
                retweets: count_from_db(row.retweets),
                impressions: count_from_db(row.impressions),
                bookmarks: count_from_db(row.bookmarks),
                quotes: row.quotes.map(count_from_db),
            },
            raw: row.raw,
        }
    }
}

fn count_to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn count_from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Upserts `items` for `request_id` in one transaction.
///
/// Conflicts on `(request_id, subject_id)` overwrite the stored metrics and
/// text, so fetching the same post twice keeps one row. Returns the number of
/// items written.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is written in
/// that case.
pub async fn upsert_items(
    pool: &PgPool,
    request_id: Uuid,
    items: &[FetchedItem],
) -> Result<usize, DbError> {
    if items.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for item in items {
        sqlx::query(
            "INSERT INTO fetched_items \
               (request_id, subject_id, author_username, text, posted_at, \
                likes, replies, retweets, impressions, bookmarks, quotes, raw) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (request_id, subject_id) DO UPDATE SET \
               author_username = EXCLUDED.author_username, \
               text = EXCLUDED.text, \
               posted_at = EXCLUDED.posted_at, \
               likes = EXCLUDED.likes, \
               replies = EXCLUDED.replies, \
               retweets = EXCLUDED.retweets, \
               impressions = EXCLUDED.impressions, \
               bookmarks = EXCLUDED.bookmarks, \
               quotes = EXCLUDED.quotes, \
               raw = EXCLUDED.raw, \
               updated_at = NOW()",
        )
        .bind(request_id)
        .bind(&item.subject_id)
        .bind(&item.author_username)
        .bind(&item.text)
        .bind(item.created_at)
        .bind(count_to_db(item.metrics.likes))
        .bind(count_to_db(item.metrics.replies))
        .bind(count_to_db(item.metrics.retweets))
        .bind(count_to_db(item.metrics.impressions))
        .bind(count_to_db(item.metrics.bookmarks))
        .bind(item.metrics.quotes.map(count_to_db))
        .bind(&item.raw)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::debug!(%request_id, count = items.len(), "upserted fetched items");
    Ok(items.len())
}

/// Distinct items stored for `request_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_items(pool: &PgPool, request_id: Uuid) -> Result<usize, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM fetched_items WHERE request_id = $1",
    )
    .bind(request_id)
    .fetch_one(pool)
    .await?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Items stored for `request_id`, newest post first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_items(pool: &PgPool, request_id: Uuid) -> Result<Vec<FetchedItem>, DbError> {
    let rows = sqlx::query_as::<_, FetchedItemRow>(
        "SELECT request_id, subject_id, author_username, text, posted_at, \
                likes, replies, retweets, impressions, bookmarks, quotes, raw \
         FROM fetched_items \
         WHERE request_id = $1 \
         ORDER BY posted_at DESC NULLS LAST, subject_id",
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(FetchedItem::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_saturate_instead_of_wrapping() {
        assert_eq!(count_to_db(u64::MAX), i64::MAX);
        assert_eq!(count_from_db(-5), 0);
        assert_eq!(count_from_db(42), 42);
    }

    #[test]
    fn row_converts_to_item() {
        let row = FetchedItemRow {
            request_id: Uuid::new_v4(),
            subject_id: "9".to_owned(),
            author_username: "alice".to_owned(),
            text: "hi".to_owned(),
            posted_at: None,
            likes: 1,
            replies: 2,
            retweets: 3,
            impressions: 400,
            bookmarks: 5,
            quotes: None,
            raw: serde_json::Value::Null,
        };
        let item = FetchedItem::from(row);
        assert_eq!(item.metrics.engagements(), 6);
        assert_eq!(item.url(), "https://x.com/alice/status/9");
    }
}
