//! Persisted analytics requests and their lifecycle status blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::progress::{BatchProgress, BatchStats, RunState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Author timelines.
    Profiles,
    /// Individual posts looked up by id.
    Posts,
    /// Keyword search.
    Search,
    /// Parent of a profile child and a post child.
    Mixed,
}

impl RequestKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Profiles => "profiles",
            RequestKind::Posts => "posts",
            RequestKind::Search => "search",
            RequestKind::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profiles" => Ok(RequestKind::Profiles),
            "posts" => Ok(RequestKind::Posts),
            "search" => Ok(RequestKind::Search),
            "mixed" => Ok(RequestKind::Mixed),
            other => Err(CoreError::InvalidRequestKind(other.to_owned())),
        }
    }
}

/// Domain counters reported once a run completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounters {
    pub profiles: usize,
    pub posts: usize,
    pub items_fetched: usize,
}

/// Status blob written to the store at every lifecycle milestone.
///
/// Stored as opaque JSON tagged by `state`. A failed status always carries
/// its error message; a completed one always carries final counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RequestStatus {
    Queued,
    Processing {
        run_id: Uuid,
        stats: BatchStats,
        started_at: DateTime<Utc>,
        #[serde(default)]
        errors: Vec<String>,
    },
    Completed {
        run_id: Uuid,
        stats: BatchStats,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        #[serde(default)]
        errors: Vec<String>,
        counters: RequestCounters,
    },
    Failed {
        run_id: Option<Uuid>,
        stats: BatchStats,
        error: String,
        failed_at: DateTime<Utc>,
    },
}

impl RequestStatus {
    /// Projects a controller's in-memory progress onto the persisted blob.
    ///
    /// `errors` are the per-item failure messages gathered so far.
    #[must_use]
    pub fn from_progress(
        progress: &BatchProgress,
        errors: &[String],
        counters: RequestCounters,
    ) -> Self {
        let run_id = progress.run_id.unwrap_or_else(Uuid::nil);
        let started_at = progress.started_at.unwrap_or_else(Utc::now);
        match progress.state {
            RunState::Queued => RequestStatus::Queued,
            RunState::Processing => RequestStatus::Processing {
                run_id,
                stats: progress.stats,
                started_at,
                errors: errors.to_vec(),
            },
            RunState::Completed => RequestStatus::Completed {
                run_id,
                stats: progress.stats,
                started_at,
                completed_at: progress.completed_at.unwrap_or_else(Utc::now),
                errors: errors.to_vec(),
                counters,
            },
            RunState::Failed => RequestStatus::Failed {
                run_id: progress.run_id,
                stats: progress.stats,
                error: progress
                    .error
                    .clone()
                    .unwrap_or_else(|| "run failed".to_owned()),
                failed_at: progress.completed_at.unwrap_or_else(Utc::now),
            },
        }
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        match self {
            RequestStatus::Queued => RunState::Queued,
            RequestStatus::Processing { .. } => RunState::Processing,
            RequestStatus::Completed { .. } => RunState::Completed,
            RequestStatus::Failed { .. } => RunState::Failed,
        }
    }

    #[must_use]
    pub fn stats(&self) -> Option<&BatchStats> {
        match self {
            RequestStatus::Queued => None,
            RequestStatus::Processing { stats, .. }
            | RequestStatus::Completed { stats, .. }
            | RequestStatus::Failed { stats, .. } => Some(stats),
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            RequestStatus::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// A request as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRequest {
    pub id: Uuid,
    pub kind: RequestKind,
    /// Subjects and filters the request was created with.
    pub inputs: serde_json::Value,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub parent_id: Option<Uuid>,
}

/// Fields supplied when inserting a request. The store assigns the id and
/// timestamps; new requests always start `queued`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub kind: RequestKind,
    pub inputs: serde_json::Value,
    pub parent_id: Option<Uuid>,
}

impl NewRequest {
    #[must_use]
    pub fn new(kind: RequestKind, inputs: serde_json::Value) -> Self {
        Self {
            kind,
            inputs,
            parent_id: None,
        }
    }

    #[must_use]
    pub fn child_of(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}
