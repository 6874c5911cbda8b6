//! Turning a parsed upload into stored requests.
//!
//! A homogeneous upload becomes one request. A mixed upload becomes a
//! `mixed` parent plus one child per reference type, so profiles and posts
//! are tracked independently. [`JobTree`] records the ids so callers can
//! enumerate and re-poll children without searching the store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xpulse_core::{ClassifiedReference, NewRequest, RequestKind, RequestStore};

use crate::error::IngestError;
use crate::source::ParsedSource;

/// Inputs blob persisted with every request created from an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceInputs {
    pub urls: Vec<String>,
    #[serde(default)]
    pub usernames: Vec<String>,
    #[serde(default)]
    pub post_ids: Vec<String>,
}

impl ReferenceInputs {
    fn from_refs<'a>(refs: impl IntoIterator<Item = &'a ClassifiedReference>) -> Self {
        let mut inputs = Self::default();
        for r in refs {
            inputs.urls.push(r.normalized.clone());
            if let Some(id) = r.subject_id() {
                inputs.post_ids.push(id.to_owned());
            } else if let Some(username) = r.username() {
                inputs.usernames.push(username.to_owned());
            }
        }
        inputs
    }
}

/// Requests to create for one upload. Children get their `parent_id` when
/// the parent is inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub root: NewRequest,
    pub children: Vec<NewRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildJob {
    pub id: Uuid,
    pub kind: RequestKind,
}

/// Ids of the requests created for one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTree {
    pub parent_id: Uuid,
    pub parent_kind: RequestKind,
    /// Empty for homogeneous uploads.
    pub children: Vec<ChildJob>,
}

impl JobTree {
    /// Requests that carry work: the children of a mixed upload, or the root
    /// itself when there are none.
    #[must_use]
    pub fn work_items(&self) -> Vec<ChildJob> {
        if self.children.is_empty() {
            vec![ChildJob {
                id: self.parent_id,
                kind: self.parent_kind,
            }]
        } else {
            self.children.clone()
        }
    }
}

/// Plans the requests for `parsed`.
///
/// # Errors
///
/// Returns [`IngestError::NothingToRegister`] when the upload holds no
/// profiles or posts, or [`IngestError::Serialize`] if the inputs blob cannot
/// be encoded.
pub fn plan_requests(parsed: &ParsedSource) -> Result<RequestPlan, IngestError> {
    let profiles = ReferenceInputs::from_refs(&parsed.profiles);
    let posts = ReferenceInputs::from_refs(&parsed.posts);

    match (parsed.profiles.is_empty(), parsed.posts.is_empty()) {
        (true, true) => Err(IngestError::NothingToRegister),
        (false, true) => Ok(RequestPlan {
            root: NewRequest::new(RequestKind::Profiles, serde_json::to_value(profiles)?),
            children: Vec::new(),
        }),
        (true, false) => Ok(RequestPlan {
            root: NewRequest::new(RequestKind::Posts, serde_json::to_value(posts)?),
            children: Vec::new(),
        }),
        (false, false) => {
            let all = ReferenceInputs::from_refs(parsed.profiles.iter().chain(&parsed.posts));
            Ok(RequestPlan {
                root: NewRequest::new(RequestKind::Mixed, serde_json::to_value(all)?),
                children: vec![
                    NewRequest::new(RequestKind::Profiles, serde_json::to_value(profiles)?),
                    NewRequest::new(RequestKind::Posts, serde_json::to_value(posts)?),
                ],
            })
        }
    }
}

/// Inserts the planned requests and returns their ids.
///
/// # Errors
///
/// Returns [`IngestError`] if planning fails or the store rejects an insert.
pub async fn register_requests<S: RequestStore>(
    store: &S,
    parsed: &ParsedSource,
) -> Result<JobTree, IngestError> {
    let plan = plan_requests(parsed)?;
    let root = store.insert(plan.root).await?;

    let mut children = Vec::with_capacity(plan.children.len());
    for child in plan.children {
        let stored = store.insert(child.child_of(root.id)).await?;
        children.push(ChildJob {
            id: stored.id,
            kind: stored.kind,
        });
    }

    tracing::info!(
        parent_id = %root.id,
        kind = %root.kind,
        children = children.len(),
        "registered upload requests"
    );

    Ok(JobTree {
        parent_id: root.id,
        parent_kind: root.kind,
        children,
    })
}

/// Rebuilds the [`JobTree`] of a stored root request.
///
/// # Errors
///
/// Returns [`IngestError::UnknownRequest`] if `parent_id` is not stored.
pub async fn load_job_tree<S: RequestStore>(
    store: &S,
    parent_id: Uuid,
) -> Result<JobTree, IngestError> {
    let root = store
        .get(parent_id)
        .await?
        .ok_or(IngestError::UnknownRequest(parent_id))?;
    let children = store
        .list_children(parent_id)
        .await?
        .into_iter()
        .map(|c| ChildJob {
            id: c.id,
            kind: c.kind,
        })
        .collect();
    Ok(JobTree {
        parent_id,
        parent_kind: root.kind,
        children,
    })
}
