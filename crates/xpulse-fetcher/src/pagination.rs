//! Cursor-driven fetch of one subject.
//!
//! [`SubjectFetch`] is a lazy, finite sequence of items. Each call to
//! [`fetch_subject_results`] starts with a fresh cursor. Pages are
//! requested only when the buffered items run out, and the sequence ends
//! at the first of: the target count reached, the API reporting no more
//! pages, an empty page, or one yielded error.

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, Stream};
use tokio_util::sync::CancellationToken;
use xpulse_core::FetchedItem;

use crate::client::ContentApiClient;
use crate::error::FetchError;
use crate::query::{build_query, SearchFilters, Subject};

/// Maximum number of pages requested for one subject. Guards against an
/// API that keeps returning the same cursor.
pub const MAX_PAGES: usize = 200;

/// Upper bound on the items requested for one subject.
pub const MAX_TARGET_COUNT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// More pages may be requested.
    Paging,
    /// The API has nothing more; drain the buffer.
    Exhausted,
    Finished,
}

pub struct SubjectFetch<'c> {
    client: &'c ContentApiClient,
    subject: Subject,
    query: Option<String>,
    filters: SearchFilters,
    target: usize,
    yielded: usize,
    pages: usize,
    cursor: Option<String>,
    buffer: VecDeque<FetchedItem>,
    phase: Phase,
    page_delay: Duration,
    cancel: CancellationToken,
}

/// Starts a fetch of up to `target_count` accepted items for `subject`.
///
/// `target_count` is capped at [`MAX_TARGET_COUNT`]. Nothing is requested
/// until the first call to [`SubjectFetch::next`].
#[must_use]
pub fn fetch_subject_results<'c>(
    client: &'c ContentApiClient,
    subject: Subject,
    target_count: usize,
    filters: SearchFilters,
) -> SubjectFetch<'c> {
    let query = build_query(&subject, &filters);
    SubjectFetch {
        client,
        subject,
        query,
        filters,
        target: target_count.min(MAX_TARGET_COUNT),
        yielded: 0,
        pages: 0,
        cursor: None,
        buffer: VecDeque::new(),
        phase: Phase::Paging,
        page_delay: client.page_delay(),
        cancel: CancellationToken::new(),
    }
}

impl<'c> SubjectFetch<'c> {
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Pages requested so far.
    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Next accepted item, `None` once the sequence has ended.
    ///
    /// After an `Err` is returned the sequence is over.
    pub async fn next(&mut self) -> Option<Result<FetchedItem, FetchError>> {
        loop {
            if self.phase == Phase::Finished || self.yielded >= self.target {
                self.phase = Phase::Finished;
                return None;
            }
            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                return Some(Ok(item));
            }
            if self.phase == Phase::Exhausted {
                self.phase = Phase::Finished;
                return None;
            }
            if let Err(e) = self.fetch_next_page().await {
                self.phase = Phase::Finished;
                tracing::warn!(
                    subject = %self.subject,
                    pages = self.pages,
                    error = %e,
                    "subject fetch aborted"
                );
                return Some(Err(e));
            }
        }
    }

    /// Adapts the fetch into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<FetchedItem, FetchError>> + 'c {
        stream::unfold(self, |mut fetch| async move {
            let next = fetch.next().await?;
            Some((next, fetch))
        })
    }

    /// Drains the sequence, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the sequence.
    pub async fn collect_all(mut self) -> Result<Vec<FetchedItem>, FetchError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }

    async fn fetch_next_page(&mut self) -> Result<(), FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if self.pages >= MAX_PAGES {
            return Err(FetchError::PaginationLimit {
                subject: self.subject.to_string(),
                max_pages: MAX_PAGES,
            });
        }
        if self.pages > 0 && !self.page_delay.is_zero() {
            tokio::select! {
                () = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                () = tokio::time::sleep(self.page_delay) => {}
            }
        }

        let (items, next_cursor) = match (&self.subject, self.query.as_deref()) {
            (Subject::Posts(ids), _) => (self.client.lookup_posts(ids).await?, None),
            (_, Some(query)) => {
                let page = self
                    .client
                    .search_page(query, self.cursor.as_deref())
                    .await?;
                let cursor = if page.has_next_page {
                    page.next_cursor
                } else {
                    None
                };
                (page.items, cursor)
            }
            (_, None) => (Vec::new(), None),
        };
        self.pages += 1;

        let received = items.len();
        self.buffer
            .extend(items.into_iter().filter(|item| self.filters.accepts(item)));
        tracing::debug!(
            subject = %self.subject,
            page = self.pages,
            received,
            accepted = self.buffer.len(),
            has_more = next_cursor.is_some(),
            "fetched page"
        );

        if received == 0 || next_cursor.is_none() {
            self.phase = Phase::Exhausted;
        }
        self.cursor = next_cursor;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_target_yields_nothing_without_requests() {
        let client = ContentApiClient::new("key", 5, "xpulse-test/0.1", 0, 0)
            .unwrap()
            .with_base_url("http://127.0.0.1:9")
            .unwrap();
        let mut fetch = fetch_subject_results(
            &client,
            Subject::Author("alice".to_owned()),
            0,
            SearchFilters::default(),
        );
        assert!(fetch.next().await.is_none());
        assert_eq!(fetch.pages_fetched(), 0);
    }

    #[tokio::test]
    async fn cancelled_fetch_yields_one_error() {
        let client = ContentApiClient::new("key", 5, "xpulse-test/0.1", 0, 0).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut fetch = fetch_subject_results(
            &client,
            Subject::Keywords("rust".to_owned()),
            10,
            SearchFilters::default(),
        )
        .with_cancellation(cancel);
        assert!(matches!(fetch.next().await, Some(Err(FetchError::Cancelled))));
        assert!(fetch.next().await.is_none());
    }

    #[test]
    fn target_is_capped() {
        let client = ContentApiClient::new("key", 5, "xpulse-test/0.1", 0, 0).unwrap();
        let fetch = fetch_subject_results(
            &client,
            Subject::Author("alice".to_owned()),
            10_000,
            SearchFilters::default(),
        );
        assert_eq!(fetch.target, MAX_TARGET_COUNT);
    }
}
