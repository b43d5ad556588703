//! Drives the feed loader across pages and renders the result.
//!
//! This is the loader's caller: it decides the merge policy, stops paging
//! when the cursor stops advancing (end of feed is a data condition, not a
//! loader state), and keeps already-loaded items on screen when a page
//! fails.

use anyhow::Result;
use perch_api::SocialApi;
use perch_common::OutputFormat;
use perch_feed::{Cursor, FeedKind, FeedLoader, FeedQuery, FeedState, MergePolicy};

use crate::render;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    api: &SocialApi,
    kind: FeedKind,
    start: Cursor,
    limit: u32,
    day_count: Option<u32>,
    pages: u32,
    policy: MergePolicy,
    output: OutputFormat,
) -> Result<()> {
    let loader = FeedLoader::new(api.clone());
    let mut state = FeedState::new(&kind);
    state.cursor = start;

    let mut loaded_pages = 0u32;
    while loaded_pages < pages {
        let mut query = FeedQuery::first_page(kind.clone(), limit).with_cursor(state.cursor.clone());
        if let Some(days) = day_count {
            query = query.with_day_count(days);
        }

        let before = state.cursor.clone();
        loader.load_page(&mut state, &query, policy).await;
        loaded_pages += 1;

        if let Some(err) = &state.last_error {
            // Accumulated items stay; the failure is reported alongside.
            eprintln!("page {loaded_pages} failed: {err}");
            break;
        }
        if state.cursor == before {
            tracing::info!(pages = loaded_pages, "feed.end_reached");
            break;
        }
    }

    for item in &state.items {
        render::print_feed_item(item, output);
    }
    match &state.cursor {
        Cursor::Scalar(Some(token)) => println!("next_cursor: {token}"),
        Cursor::Scalar(None) => println!("next_cursor: (start)"),
        Cursor::Compound { like, id } => println!(
            "next cursor_like: {} cursor_id: {}",
            like.as_deref().unwrap_or("(start)"),
            id.as_deref().unwrap_or("(start)")
        ),
    }

    Ok(())
}
