//! Store selection: Postgres when `DATABASE_URL` is set, otherwise an
//! in-process store that lives as long as the command.

use uuid::Uuid;
use xpulse_core::{
    AnalyticsRequest, AppConfig, FetchedItem, MemoryRequestStore, NewRequest, RequestStatus,
    RequestStore, StoreError,
};
use xpulse_db::PgRequestStore;

pub(crate) enum AnyStore {
    Memory(MemoryRequestStore),
    Postgres(PgRequestStore),
}

impl AnyStore {
    pub(crate) fn is_persistent(&self) -> bool {
        matches!(self, AnyStore::Postgres(_))
    }
}

/// Opens the configured store.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is set but the pool cannot connect.
pub(crate) async fn open_store(config: &AppConfig) -> anyhow::Result<AnyStore> {
    if config.database_url.is_none() {
        tracing::info!("DATABASE_URL not set; request status is kept in memory for this run");
        return Ok(AnyStore::Memory(MemoryRequestStore::new()));
    }
    let pool = xpulse_db::connect_pool_from_config(config).await?;
    Ok(AnyStore::Postgres(PgRequestStore::new(pool)))
}

impl RequestStore for AnyStore {
    async fn insert(&self, request: NewRequest) -> Result<AnalyticsRequest, StoreError> {
        match self {
            AnyStore::Memory(s) => s.insert(request).await,
            AnyStore::Postgres(s) => s.insert(request).await,
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalyticsRequest>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.get(id).await,
            AnyStore::Postgres(s) => s.get(id).await,
        }
    }

    async fn update_status(&self, id: Uuid, status: &RequestStatus) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.update_status(id, status).await,
            AnyStore::Postgres(s) => s.update_status(id, status).await,
        }
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<AnalyticsRequest>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.list_children(parent_id).await,
            AnyStore::Postgres(s) => s.list_children(parent_id).await,
        }
    }

    async fn upsert_items(
        &self,
        request_id: Uuid,
        items: &[FetchedItem],
    ) -> Result<usize, StoreError> {
        match self {
            AnyStore::Memory(s) => s.upsert_items(request_id, items).await,
            AnyStore::Postgres(s) => s.upsert_items(request_id, items).await,
        }
    }

    async fn count_items(&self, request_id: Uuid) -> Result<usize, StoreError> {
        match self {
            AnyStore::Memory(s) => s.count_items(request_id).await,
            AnyStore::Postgres(s) => s.count_items(request_id).await,
        }
    }
}
