//! Mutable per-feed pagination state.

use serde_json::Value;

use crate::query::{Cursor, FeedKind};

/// How a fetched page is merged into [`FeedState::items`]. This is the
/// caller's choice per load: `Append` for infinite scroll and for the
/// popular feed's accumulation, `Replace` for manual cursor navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    Replace,
    Append,
}

/// State for one logical feed. Exactly one writer (the loader); any number
/// of readers. Created when a feed view opens, discarded with it; nothing
/// here persists.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    /// All items loaded so far, in server rank order. Never deduplicated.
    pub items: Vec<Value>,
    /// Current pagination position; advances only after a successful fetch
    /// that carried a next cursor.
    pub cursor: Cursor,
    /// True exactly while a fetch for this feed is in flight. Doubles as
    /// the re-entry guard: a load started while this is set is dropped,
    /// not queued.
    pub loading: bool,
    /// Description of the most recent failure, cleared when a new fetch
    /// starts. Survives until then so a view can keep showing it.
    pub last_error: Option<String>,
}

impl FeedState {
    pub fn new(kind: &FeedKind) -> Self {
        Self {
            items: Vec::new(),
            cursor: Cursor::start(kind),
            loading: false,
            last_error: None,
        }
    }
}
