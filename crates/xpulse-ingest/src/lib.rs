//! Batch source construction: CSV uploads and free-text author lists are
//! turned into deduplicated, classified references with per-row
//! diagnostics, size-checked, and registered as stored requests.

pub mod authors;
pub mod error;
pub mod plan;
pub mod source;
pub mod validate;

pub use authors::{parse_author_list, AuthorList};
pub use error::IngestError;
pub use plan::{
    load_job_tree, plan_requests, register_requests, ChildJob, JobTree, ReferenceInputs,
    RequestPlan,
};
pub use source::{parse_source, parse_source_bytes, ParsedSource};
pub use validate::{validate_batch_size, BatchSizeStats, BatchValidation, DEFAULT_MAX_BATCH_URLS};
