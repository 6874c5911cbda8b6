//! Classification of raw profile and post URLs.
//!
//! Input comes from free text and CSV uploads, so it is frequently missing a
//! scheme, uses either content-site domain, or carries tracking query
//! strings. [`classify`] folds all of that into a [`ClassifiedReference`]
//! whose `normalized` form is canonical: the same profile or post always
//! normalizes to the same `https://x.com/...` string regardless of how it
//! was spelled.
//!
//! Classification never fails. Anything that cannot be understood becomes
//! [`ReferenceKind::Invalid`].

use serde::{Deserialize, Serialize};
use url::Url;

/// Hosts accepted as content-site URLs. `www.` and `mobile.` prefixes are
/// stripped before comparison.
pub const KNOWN_DOMAINS: [&str; 2] = ["x.com", "twitter.com"];

/// Path segment separating a username from a post id.
const STATUS_SEGMENT: &str = "status";

const CANONICAL_ORIGIN: &str = "https://x.com";

/// What a reference points at.
///
/// The variants carry exactly the identifiers that make sense for them, so
/// a profile can never hold a post id and an invalid reference holds
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReferenceKind {
    Profile { username: String },
    Post { username: String, post_id: String },
    Invalid,
}

/// A raw input line resolved into a typed reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassifiedReference {
    /// The input exactly as supplied.
    pub original: String,
    /// Canonical URL for valid references; the scheme-prefixed input otherwise.
    pub normalized: String,
    #[serde(flatten)]
    pub kind: ReferenceKind,
}

impl ClassifiedReference {
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match &self.kind {
            ReferenceKind::Profile { username } | ReferenceKind::Post { username, .. } => {
                Some(username)
            }
            ReferenceKind::Invalid => None,
        }
    }

    /// The post id, present only for [`ReferenceKind::Post`].
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        match &self.kind {
            ReferenceKind::Post { post_id, .. } => Some(post_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_profile(&self) -> bool {
        matches!(self.kind, ReferenceKind::Profile { .. })
    }

    #[must_use]
    pub fn is_post(&self) -> bool {
        matches!(self.kind, ReferenceKind::Post { .. })
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self.kind, ReferenceKind::Invalid)
    }
}

/// References from one input set, partitioned by kind. Input order is kept
/// within each partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedBatch {
    pub profiles: Vec<ClassifiedReference>,
    pub posts: Vec<ClassifiedReference>,
    pub invalid: Vec<ClassifiedReference>,
}

impl ClassifiedBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len() + self.posts.len() + self.invalid.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, reference: ClassifiedReference) {
        match reference.kind {
            ReferenceKind::Profile { .. } => self.profiles.push(reference),
            ReferenceKind::Post { .. } => self.posts.push(reference),
            ReferenceKind::Invalid => self.invalid.push(reference),
        }
    }
}

/// Prefixes `https://` when `raw` carries no scheme.
#[must_use]
pub fn with_https_scheme(raw: &str) -> String {
    if raw.starts_with("https://") || raw.starts_with("http://") {
        raw.to_owned()
    } else {
        format!("https://{raw}")
    }
}

/// Returns `true` when `text` mentions one of the [`KNOWN_DOMAINS`].
///
/// This is a substring check used to triage CSV cells before they are
/// parsed; it does not validate the host.
#[must_use]
pub fn mentions_known_domain(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    KNOWN_DOMAINS.iter().any(|d| lower.contains(d))
}

/// Classifies one raw URL.
///
/// Examples:
/// - `x.com/alice` → profile `alice`
/// - `https://twitter.com/alice/status/42` → post `42` by `alice`
/// - `https://example.com/alice` → invalid
#[must_use]
pub fn classify(raw: &str) -> ClassifiedReference {
    let trimmed = raw.trim();
    let prefixed = with_https_scheme(trimmed);

    let kind = Url::parse(&prefixed)
        .ok()
        .and_then(|url| kind_from_url(&url))
        .unwrap_or(ReferenceKind::Invalid);

    let normalized = match &kind {
        ReferenceKind::Profile { username } => format!("{CANONICAL_ORIGIN}/{username}"),
        ReferenceKind::Post { username, post_id } => {
            format!("{CANONICAL_ORIGIN}/{username}/{STATUS_SEGMENT}/{post_id}")
        }
        ReferenceKind::Invalid => prefixed,
    };

    ClassifiedReference {
        original: raw.to_owned(),
        normalized,
        kind,
    }
}

/// Classifies every URL and partitions the results.
#[must_use]
pub fn classify_many<I, S>(urls: I) -> ClassifiedBatch
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut batch = ClassifiedBatch::default();
    for url in urls {
        batch.push(classify(url.as_ref()));
    }
    batch
}

fn kind_from_url(url: &Url) -> Option<ReferenceKind> {
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("mobile."))
        .unwrap_or(&host);
    if !KNOWN_DOMAINS.contains(&host) {
        return None;
    }

    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        [username] => Some(ReferenceKind::Profile {
            username: (*username).to_owned(),
        }),
        [username, marker, post_id] if *marker == STATUS_SEGMENT => Some(ReferenceKind::Post {
            username: (*username).to_owned(),
            post_id: (*post_id).to_owned(),
        }),
        _ => None,
    }
}

#[cfg(test)]
#[path = "reference_test.rs"]
mod tests;
