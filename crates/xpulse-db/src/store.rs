//! [`RequestStore`] over Postgres.

use sqlx::PgPool;
use uuid::Uuid;
use xpulse_core::{
    AnalyticsRequest, FetchedItem, NewRequest, RequestStatus, RequestStore, StoreError,
};

use crate::{items, requests, DbError};

#[derive(Debug, Clone)]
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::RequestNotFound(id) => StoreError::NotFound(id),
            DbError::Json(e) => StoreError::Serialize(e),
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

impl RequestStore for PgRequestStore {
    async fn insert(&self, request: NewRequest) -> Result<AnalyticsRequest, StoreError> {
        Ok(requests::insert_request(&self.pool, &request).await?)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalyticsRequest>, StoreError> {
        Ok(requests::get_request(&self.pool, id).await?)
    }

    async fn update_status(&self, id: Uuid, status: &RequestStatus) -> Result<(), StoreError> {
        Ok(requests::update_request_status(&self.pool, id, status).await?)
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<AnalyticsRequest>, StoreError> {
        Ok(requests::list_child_requests(&self.pool, parent_id).await?)
    }

    async fn upsert_items(
        &self,
        request_id: Uuid,
        items: &[FetchedItem],
    ) -> Result<usize, StoreError> {
        Ok(items::upsert_items(&self.pool, request_id, items).await?)
    }

    async fn count_items(&self, request_id: Uuid) -> Result<usize, StoreError> {
        Ok(items::count_items(&self.pool, request_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_request_maps_to_not_found() {
        let id = Uuid::new_v4();
        let err = StoreError::from(DbError::RequestNotFound(id));
        assert!(matches!(err, StoreError::NotFound(got) if got == id));
    }

    #[test]
    fn other_errors_become_backend_errors() {
        let err = StoreError::from(DbError::MissingDatabaseUrl);
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
