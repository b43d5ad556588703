//! Cursor-paginated feed loading for the perch console.
//!
//! One [`FeedState`] owns the pagination position for one logical feed:
//! home timeline, replies to a tweet, a user's tweets, or the popularity
//! ranked feed. [`FeedLoader::load_page`] drives a single
//! query → page → merge cycle against a [`FeedTransport`], so the whole
//! thing is testable with a scripted in-memory transport and no network.
//!
//! Feed items are opaque [`serde_json::Value`] records: the loader keeps
//! server order, never deduplicates, and never looks inside an item.

pub mod loader;
pub mod page;
pub mod query;
pub mod state;

pub use loader::{FeedError, FeedLoader, FeedTransport};
pub use page::{FeedPage, NextCursor};
pub use query::{Cursor, FeedKind, FeedQuery};
pub use state::{FeedState, MergePolicy};
