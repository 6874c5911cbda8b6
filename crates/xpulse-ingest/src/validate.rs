use serde::{Deserialize, Serialize};
use xpulse_core::ClassifiedReference;

/// Default ceiling on URLs accepted from one upload.
pub const DEFAULT_MAX_BATCH_URLS: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSizeStats {
    /// Profiles plus posts.
    pub total_urls: usize,
    pub profile_count: usize,
    pub post_count: usize,
    pub invalid_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchValidation {
    pub is_valid: bool,
    pub error: Option<String>,
    /// Always populated, valid or not.
    pub stats: BatchSizeStats,
}

/// Checks that a batch is non-empty and within `max_batch_size` URLs.
#[must_use]
pub fn validate_batch_size(
    profiles: &[ClassifiedReference],
    posts: &[ClassifiedReference],
    invalid: &[ClassifiedReference],
    max_batch_size: usize,
) -> BatchValidation {
    let stats = BatchSizeStats {
        total_urls: profiles.len() + posts.len(),
        profile_count: profiles.len(),
        post_count: posts.len(),
        invalid_count: invalid.len(),
    };

    let error = if stats.total_urls == 0 {
        Some("no valid profile or post URLs found in the batch".to_owned())
    } else if stats.total_urls > max_batch_size {
        Some(format!(
            "batch contains {} URLs, which exceeds the maximum of {max_batch_size} per batch",
            stats.total_urls
        ))
    } else {
        None
    };

    BatchValidation {
        is_valid: error.is_none(),
        error,
        stats,
    }
}
