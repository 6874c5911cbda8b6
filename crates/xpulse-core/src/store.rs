//! The request status store seam.
//!
//! The controller and the source builder only need get / insert /
//! update-by-id plus idempotent item upserts. [`RequestStore`] captures that
//! surface; `xpulse-db` implements it over Postgres and
//! [`MemoryRequestStore`] implements it in-process.
//!
//! Status updates replace the whole blob. There is no read-modify-write
//! guarantee, so two writers on the same id race and the later write wins.
//! One controller owns a request id at a time.

use std::collections::HashMap;
use std::future::Future;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::item::FetchedItem;
use crate::request::{AnalyticsRequest, NewRequest, RequestStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request {0} not found")]
    NotFound(Uuid),

    #[error("status serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub trait RequestStore: Send + Sync {
    /// Inserts a new `queued` request and returns it as stored.
    fn insert(
        &self,
        request: NewRequest,
    ) -> impl Future<Output = Result<AnalyticsRequest, StoreError>> + Send;

    fn get(&self, id: Uuid)
        -> impl Future<Output = Result<Option<AnalyticsRequest>, StoreError>> + Send;

    /// Replaces the status blob of request `id` and bumps `updated_at`.
    ///
    /// Returns [`StoreError::NotFound`] if the id is unknown.
    fn update_status(
        &self,
        id: Uuid,
        status: &RequestStatus,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Children of `parent_id` in creation order.
    fn list_children(
        &self,
        parent_id: Uuid,
    ) -> impl Future<Output = Result<Vec<AnalyticsRequest>, StoreError>> + Send;

    /// Upserts items keyed by `(request_id, subject_id)`. Returns the number
    /// of items written.
    fn upsert_items(
        &self,
        request_id: Uuid,
        items: &[FetchedItem],
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Distinct items stored for `request_id`.
    fn count_items(&self, request_id: Uuid)
        -> impl Future<Output = Result<usize, StoreError>> + Send;
}

#[derive(Default)]
struct MemoryState {
    requests: HashMap<Uuid, AnalyticsRequest>,
    insertion_order: Vec<Uuid>,
    items: HashMap<(Uuid, String), FetchedItem>,
}

/// In-process [`RequestStore`] used by tests and by the CLI when no
/// `DATABASE_URL` is configured.
#[derive(Default)]
pub struct MemoryRequestStore {
    state: Mutex<MemoryState>,
}

impl MemoryRequestStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items stored for `request_id`, ordered by post id.
    pub async fn items_for(&self, request_id: Uuid) -> Vec<FetchedItem> {
        let state = self.state.lock().await;
        let mut items: Vec<FetchedItem> = state
            .items
            .iter()
            .filter(|((rid, _), _)| *rid == request_id)
            .map(|(_, item)| item.clone())
            .collect();
        items.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
        items
    }
}

impl RequestStore for MemoryRequestStore {
    async fn insert(&self, request: NewRequest) -> Result<AnalyticsRequest, StoreError> {
        let now = Utc::now();
        let stored = AnalyticsRequest {
            id: Uuid::new_v4(),
            kind: request.kind,
            inputs: request.inputs,
            status: RequestStatus::Queued,
            created_at: now,
            updated_at: now,
            parent_id: request.parent_id,
        };
        let mut state = self.state.lock().await;
        state.insertion_order.push(stored.id);
        state.requests.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalyticsRequest>, StoreError> {
        Ok(self.state.lock().await.requests.get(&id).cloned())
    }

    async fn update_status(&self, id: Uuid, status: &RequestStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let request = state.requests.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        request.status = status.clone();
        request.updated_at = Utc::now();
        Ok(())
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<AnalyticsRequest>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .insertion_order
            .iter()
            .filter_map(|id| state.requests.get(id))
            .filter(|r| r.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn upsert_items(
        &self,
        request_id: Uuid,
        items: &[FetchedItem],
    ) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        if !state.requests.contains_key(&request_id) {
            return Err(StoreError::NotFound(request_id));
        }
        for item in items {
            state
                .items
                .insert((request_id, item.subject_id.clone()), item.clone());
        }
        Ok(items.len())
    }

    async fn count_items(&self, request_id: Uuid) -> Result<usize, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .keys()
            .filter(|(rid, _)| *rid == request_id)
            .count())
    }
}
