//! Database operations for `analytics_requests`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use xpulse_core::{AnalyticsRequest, NewRequest, RequestKind, RequestStatus};

use crate::DbError;

const REQUEST_COLUMNS: &str = "id, kind, inputs, status, parent_id, created_at, updated_at";

/// A row from the `analytics_requests` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalyticsRequestRow {
    pub id: Uuid,
    pub kind: String,
    pub inputs: serde_json::Value,
    /// Serialized [`RequestStatus`].
    pub status: serde_json::Value,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalyticsRequestRow {
    /// # Errors
    ///
    /// Returns [`DbError::InvalidKind`] for an unknown `kind` and
    /// [`DbError::CorruptRow`] for a status blob that does not decode.
    pub fn into_domain(self) -> Result<AnalyticsRequest, DbError> {
        let kind: RequestKind = self.kind.parse()?;
        let status: RequestStatus =
            serde_json::from_value(self.status).map_err(|e| DbError::CorruptRow {
                table: "analytics_requests",
                reason: format!("status of {}: {e}", self.id),
            })?;
        Ok(AnalyticsRequest {
            id: self.id,
            kind,
            inputs: self.inputs,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            parent_id: self.parent_id,
        })
    }
}

/// Inserts a `queued` request with a UUID generated in Rust.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including an unknown
/// `parent_id`).
pub async fn insert_request(pool: &PgPool, request: &NewRequest) -> Result<AnalyticsRequest, DbError> {
    let status = serde_json::to_value(RequestStatus::Queued)?;
    let row = sqlx::query_as::<_, AnalyticsRequestRow>(&format!(
        "INSERT INTO analytics_requests (id, kind, inputs, status, parent_id) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(request.kind.as_str())
    .bind(&request.inputs)
    .bind(status)
    .bind(request.parent_id)
    .fetch_one(pool)
    .await?;

    row.into_domain()
}

/// # Errors
///
/// Returns [`DbError`] if the query fails or the row does not decode.
pub async fn get_request(pool: &PgPool, id: Uuid) -> Result<Option<AnalyticsRequest>, DbError> {
    let row = sqlx::query_as::<_, AnalyticsRequestRow>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM analytics_requests WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(AnalyticsRequestRow::into_domain).transpose()
}

/// Replaces the status blob and bumps `updated_at`. Last write wins.
///
/// # Errors
///
/// Returns [`DbError::RequestNotFound`] if no row has `id`.
pub async fn update_request_status(
    pool: &PgPool,
    id: Uuid,
    status: &RequestStatus,
) -> Result<(), DbError> {
    let blob = serde_json::to_value(status)?;
    let result = sqlx::query(
        "UPDATE analytics_requests \
         SET status = $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(blob)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::RequestNotFound(id));
    }
    Ok(())
}

/// Children of `parent_id`, oldest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row does not decode.
pub async fn list_child_requests(
    pool: &PgPool,
    parent_id: Uuid,
) -> Result<Vec<AnalyticsRequest>, DbError> {
    let rows = sqlx::query_as::<_, AnalyticsRequestRow>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM analytics_requests \
         WHERE parent_id = $1 \
         ORDER BY created_at, id"
    ))
    .bind(parent_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AnalyticsRequestRow::into_domain).collect()
}
