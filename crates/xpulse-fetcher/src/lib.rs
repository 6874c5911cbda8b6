//! Cursor-paginated client for the third-party content API.
//!
//! [`ContentApiClient`] wraps the search and lookup endpoints with bearer
//! auth and retry. [`fetch_subject_results`] walks the result pages of one
//! subject lazily, and [`fetch_multiple_subjects`] runs a few subjects
//! concurrently while streaming items to an optional sink.

pub mod client;
pub mod error;
pub mod multi;
pub mod pagination;
pub mod query;
pub(crate) mod rate_limit;
pub mod types;

pub use client::ContentApiClient;
pub use error::FetchError;
pub use multi::{
    fetch_multiple_subjects, FetchMessage, MultiFetchReport, SubjectFailure,
    DEFAULT_SUBJECT_CONCURRENCY, MAX_SUBJECT_CONCURRENCY,
};
pub use pagination::{fetch_subject_results, SubjectFetch, MAX_PAGES, MAX_TARGET_COUNT};
pub use query::{build_query, SearchFilters, Subject};
pub use types::SearchPage;
