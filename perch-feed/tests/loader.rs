use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use perch_feed::{
    Cursor, FeedError, FeedKind, FeedLoader, FeedPage, FeedQuery, FeedState, FeedTransport,
    MergePolicy, NextCursor,
};
use serde_json::{Value, json};

/// Transport scripted with canned outcomes, recording every query it saw.
struct Scripted {
    outcomes: Mutex<VecDeque<Result<FeedPage, FeedError>>>,
    seen: Mutex<Vec<FeedQuery>>,
}

impl Scripted {
    fn new(outcomes: Vec<Result<FeedPage, FeedError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<FeedQuery> {
        self.seen.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl FeedTransport for Scripted {
    async fn fetch_page(&self, query: &FeedQuery) -> Result<FeedPage, FeedError> {
        self.seen.lock().unwrap().push(query.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted transport ran out of outcomes")
    }
}

fn page(items: Vec<Value>, next: Option<NextCursor>) -> FeedPage {
    FeedPage { items, next }
}

#[tokio::test]
async fn in_flight_guard_drops_the_call_without_a_request() {
    let loader = FeedLoader::new(Scripted::new(vec![]));
    let query = FeedQuery::first_page(FeedKind::Home, 30);
    let mut state = FeedState::new(&query.kind);
    state.loading = true;
    let before = state.clone();

    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;

    assert_eq!(loader.transport().calls(), 0);
    assert_eq!(state, before);
}

#[tokio::test]
async fn cursor_advances_from_next_cursor_and_holds_at_end_of_feed() {
    let loader = FeedLoader::new(Scripted::new(vec![
        Ok(page(vec![json!({"id": 1})], Some(NextCursor::Scalar("2".into())))),
        Ok(page(vec![], None)),
    ]));
    let query = FeedQuery::first_page(FeedKind::Home, 30);
    let mut state = FeedState::new(&query.kind);

    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;
    assert_eq!(state.cursor, Cursor::Scalar(Some("2".into())));

    let query = query.with_cursor(state.cursor.clone());
    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;
    // No next cursor: the position stays where it was.
    assert_eq!(state.cursor, Cursor::Scalar(Some("2".into())));
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn failures_leave_items_and_cursor_untouched() {
    let outcomes: Vec<Result<FeedPage, FeedError>> = vec![
        Err(FeedError::Status {
            status: 500,
            reason: "Internal Server Error".into(),
            body: "boom".into(),
        }),
        Err(FeedError::Transport("connection refused".into())),
        Err(FeedError::Contract("response lacks `items`".into())),
    ];
    let loader = FeedLoader::new(Scripted::new(outcomes));

    let query = FeedQuery::first_page(FeedKind::Home, 30)
        .with_cursor(Cursor::Scalar(Some("9".into())));
    let mut state = FeedState::new(&query.kind);
    state.items = vec![json!({"id": 1})];
    state.cursor = Cursor::Scalar(Some("9".into()));

    for expected in [
        "HTTP 500 Internal Server Error - boom",
        "network error: connection refused",
        "contract violation: response lacks `items`",
    ] {
        loader
            .load_page(&mut state, &query, MergePolicy::Append)
            .await;
        assert_eq!(state.items, vec![json!({"id": 1})]);
        assert_eq!(state.cursor, Cursor::Scalar(Some("9".into())));
        assert!(!state.loading);
        assert_eq!(state.last_error.as_deref(), Some(expected));
    }
}

#[tokio::test]
async fn a_new_attempt_clears_the_previous_error() {
    let loader = FeedLoader::new(Scripted::new(vec![
        Err(FeedError::Transport("connection refused".into())),
        Ok(page(vec![], None)),
    ]));
    let query = FeedQuery::first_page(FeedKind::Home, 30);
    let mut state = FeedState::new(&query.kind);

    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;
    assert!(state.last_error.is_some());

    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn popular_pages_append_in_order_without_dedup() {
    let loader = FeedLoader::new(Scripted::new(vec![
        Ok(page(
            vec![json!("a"), json!("b")],
            Some(NextCursor::Compound { like: "5".into(), id: "2".into() }),
        )),
        Ok(page(vec![json!("c"), json!("d")], None)),
    ]));
    let query = FeedQuery::first_page(FeedKind::Popular, 2).with_day_count(15);
    let mut state = FeedState::new(&query.kind);

    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;
    let query = query.with_cursor(state.cursor.clone());
    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;

    assert_eq!(
        state.items,
        vec![json!("a"), json!("b"), json!("c"), json!("d")]
    );
}

#[tokio::test]
async fn replace_policy_swaps_the_items_wholesale() {
    let loader = FeedLoader::new(Scripted::new(vec![Ok(page(
        vec![json!("new")],
        None,
    ))]));
    let query = FeedQuery::first_page(FeedKind::Home, 30);
    let mut state = FeedState::new(&query.kind);
    state.items = vec![json!("old")];

    loader
        .load_page(&mut state, &query, MergePolicy::Replace)
        .await;
    assert_eq!(state.items, vec![json!("new")]);
}

#[tokio::test]
async fn compound_cursor_round_trips_into_the_next_request() {
    let loader = FeedLoader::new(Scripted::new(vec![
        Ok(page(
            vec![],
            Some(NextCursor::Compound { like: "5".into(), id: "42".into() }),
        )),
        Ok(page(vec![], None)),
    ]));
    let query = FeedQuery::first_page(FeedKind::Popular, 30).with_day_count(15);
    let mut state = FeedState::new(&query.kind);

    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;
    assert_eq!(
        state.cursor,
        Cursor::Compound { like: Some("5".into()), id: Some("42".into()) }
    );

    let query = query.with_cursor(state.cursor.clone());
    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;

    let second = &loader.transport().seen()[1];
    assert_eq!(
        second.params(),
        vec![
            ("cursor_like", "5".to_string()),
            ("cursor_id", "42".to_string()),
            ("limit", "30".to_string()),
            ("day_count", "15".to_string()),
        ]
    );
}

#[tokio::test]
async fn end_of_feed_reissues_the_identical_request() {
    let loader = FeedLoader::new(Scripted::new(vec![
        Ok(page(vec![], None)),
        Ok(page(vec![], None)),
    ]));
    let query = FeedQuery::first_page(FeedKind::Home, 30)
        .with_cursor(Cursor::Scalar(Some("7".into())));
    let mut state = FeedState::new(&query.kind);
    state.cursor = Cursor::Scalar(Some("7".into()));

    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;
    let query = query.clone().with_cursor(state.cursor.clone());
    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;

    let seen = loader.transport().seen();
    assert_eq!(seen[0], seen[1]);
    assert_eq!(seen[1].params(), seen[0].params());
}

#[tokio::test]
async fn first_home_page_end_to_end() {
    let loader = FeedLoader::new(Scripted::new(vec![Ok(page(
        vec![json!({"id": 1}), json!({"id": 2})],
        Some(NextCursor::Scalar("2".into())),
    ))]));
    let query = FeedQuery::first_page(FeedKind::Home, 2);
    let mut state = FeedState::new(&query.kind);

    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;

    assert_eq!(state.cursor, Cursor::Scalar(Some("2".into())));
    assert_eq!(state.items, vec![json!({"id": 1}), json!({"id": 2})]);
    assert!(!state.loading);
    assert!(state.last_error.is_none());

    let seen = loader.transport().seen();
    assert_eq!(seen[0].params(), vec![("limit", "2".to_string())]);
}

#[tokio::test]
async fn legacy_scalar_cursor_on_popular_advances_id_and_keeps_like() {
    let loader = FeedLoader::new(Scripted::new(vec![Ok(page(
        vec![],
        Some(NextCursor::Scalar("42".into())),
    ))]));
    let query = FeedQuery::first_page(FeedKind::Popular, 30)
        .with_cursor(Cursor::Compound { like: Some("5".into()), id: Some("40".into()) });
    let mut state = FeedState::new(&query.kind);
    state.cursor = query.cursor.clone();

    loader
        .load_page(&mut state, &query, MergePolicy::Append)
        .await;
    assert_eq!(
        state.cursor,
        Cursor::Compound { like: Some("5".into()), id: Some("42".into()) }
    );
}
