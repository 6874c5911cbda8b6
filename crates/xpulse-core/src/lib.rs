//! Domain types shared across the xpulse workspace: reference
//! classification, run progress, persisted request status, the status
//! store seam, and application configuration.

pub mod app_config;
pub mod config;
pub mod error;
pub mod item;
pub mod progress;
pub mod reference;
pub mod request;
pub mod store;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, DEFAULT_API_BASE_URL};
pub use error::{ConfigError, CoreError};
pub use item::{FetchedItem, ItemMetrics};
pub use progress::{BatchProgress, BatchStats, RunState};
pub use reference::{
    classify, classify_many, mentions_known_domain, with_https_scheme, ClassifiedBatch,
    ClassifiedReference, ReferenceKind, KNOWN_DOMAINS,
};
pub use request::{AnalyticsRequest, NewRequest, RequestCounters, RequestKind, RequestStatus};
pub use store::{MemoryRequestStore, RequestStore, StoreError};
