//! Fetching several subjects at once.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use xpulse_core::FetchedItem;

use crate::client::ContentApiClient;
use crate::pagination::fetch_subject_results;
use crate::query::{SearchFilters, Subject};

pub const DEFAULT_SUBJECT_CONCURRENCY: usize = 2;
pub const MAX_SUBJECT_CONCURRENCY: usize = 3;

/// Incremental output of [`fetch_multiple_subjects`].
///
/// `Partial` messages are additive. The single `Complete` message carries
/// the full result and supersedes every partial seen before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FetchMessage {
    Partial { subject: String, item: FetchedItem },
    Complete { items: Vec<FetchedItem> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectFailure {
    pub subject: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MultiFetchReport {
    /// Items from every subject, including those a failing subject yielded
    /// before its error.
    pub items: Vec<FetchedItem>,
    pub failures: Vec<SubjectFailure>,
}

/// Fetches every subject with at most `concurrency` in flight (clamped to
/// `1..=3`).
///
/// A failing subject is recorded in [`MultiFetchReport::failures`] and does
/// not affect the others. When `sink` is given, every item is sent as a
/// [`FetchMessage::Partial`] as soon as it arrives, followed by one
/// [`FetchMessage::Complete`]. A closed sink is ignored.
pub async fn fetch_multiple_subjects(
    client: &ContentApiClient,
    subjects: Vec<Subject>,
    target_count: usize,
    filters: &SearchFilters,
    concurrency: usize,
    sink: Option<&mpsc::Sender<FetchMessage>>,
) -> MultiFetchReport {
    let concurrency = concurrency.clamp(1, MAX_SUBJECT_CONCURRENCY);
    let subject_count = subjects.len();

    let outcomes: Vec<(String, Vec<FetchedItem>, Option<String>)> = stream::iter(subjects)
        .map(|subject| {
            let label = subject.to_string();
            let mut fetch = fetch_subject_results(client, subject, target_count, filters.clone());
            async move {
                let mut items = Vec::new();
                let mut error = None;
                while let Some(next) = fetch.next().await {
                    match next {
                        Ok(item) => {
                            if let Some(tx) = sink {
                                let _ = tx
                                    .send(FetchMessage::Partial {
                                        subject: label.clone(),
                                        item: item.clone(),
                                    })
                                    .await;
                            }
                            items.push(item);
                        }
                        Err(e) => error = Some(e.to_string()),
                    }
                }
                (label, items, error)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut report = MultiFetchReport::default();
    for (subject, items, error) in outcomes {
        if let Some(error) = error {
            tracing::warn!(%subject, %error, "subject fetch failed");
            report.failures.push(SubjectFailure { subject, error });
        }
        report.items.extend(items);
    }

    if !report.failures.is_empty() {
        tracing::warn!(
            failed_subjects = report.failures.len(),
            total_subjects = subject_count,
            "some subjects failed during fetch"
        );
    }

    if let Some(tx) = sink {
        let _ = tx
            .send(FetchMessage::Complete {
                items: report.items.clone(),
            })
            .await;
    }

    report
}
