//! The query → page → merge cycle.

use async_trait::async_trait;
use thiserror::Error;

use crate::page::FeedPage;
use crate::query::FeedQuery;
use crate::state::{FeedState, MergePolicy};

/// Failure classes a page fetch can produce. All of them are reduced to
/// [`FeedState::last_error`] at the loader boundary; none propagate.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// The request could not be sent or the response could not be read.
    #[error("network error: {0}")]
    Transport(String),
    /// The server answered with a non-success status.
    #[error("HTTP {status} {reason} - {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },
    /// The body was not valid JSON, or lacked the `items`/`next_cursor`
    /// shape.
    #[error("contract violation: {0}")]
    Contract(String),
}

/// Transport seam: one page fetch for one query. The production
/// implementation lives in the API client crate; tests script this.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn fetch_page(&self, query: &FeedQuery) -> Result<FeedPage, FeedError>;
}

/// Drives page fetches for feed states against one transport.
pub struct FeedLoader<T> {
    transport: T,
}

impl<T: FeedTransport> FeedLoader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Load one page described by `query` into `state`.
    ///
    /// Re-entry guard: if `state.loading` is already set the call returns
    /// immediately without touching the transport: a second load for the
    /// same feed is dropped, not queued. Otherwise exactly one fetch is
    /// issued; there are no automatic retries and no cancellation (a caller
    /// wanting a hard time bound sets one on the transport).
    ///
    /// On success the page's items are merged per `policy` and the cursor
    /// advances only when the page carried a next cursor. An exhausted
    /// feed leaves the cursor untouched, which is how callers notice the
    /// end. On any failure `state.last_error` gets a description (status
    /// code and text included when available) and items and cursor stay
    /// exactly as they were.
    pub async fn load_page(&self, state: &mut FeedState, query: &FeedQuery, policy: MergePolicy) {
        if state.loading {
            tracing::debug!(path = %query.path(), "feed.load.dropped_in_flight");
            return;
        }
        state.loading = true;
        state.last_error = None;

        match self.transport.fetch_page(query).await {
            Ok(page) => {
                tracing::debug!(
                    path = %query.path(),
                    items = page.items.len(),
                    advanced = page.next.is_some(),
                    "feed.page.loaded"
                );
                match policy {
                    MergePolicy::Replace => state.items = page.items,
                    MergePolicy::Append => state.items.extend(page.items),
                }
                if let Some(next) = page.next {
                    state.cursor = query.cursor.advanced(next);
                }
            }
            Err(err) => {
                tracing::warn!(path = %query.path(), error = %err, "feed.load.failed");
                state.last_error = Some(err.to_string());
            }
        }

        state.loading = false;
    }
}
