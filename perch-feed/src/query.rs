//! Immutable description of a single feed page request.

/// Which logical feed a query targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedKind {
    /// The authenticated user's home timeline.
    Home,
    /// Replies to one tweet.
    Replies { tweet_id: u64 },
    /// One user's own tweets.
    UserTweets { user_id: u64 },
    /// Globally ranked popular tweets. Ranking is by a non-unique
    /// popularity score, so pagination uses a compound cursor.
    Popular,
}

impl FeedKind {
    /// Whether this feed paginates with a compound (score, id) cursor.
    pub fn is_compound(&self) -> bool {
        matches!(self, Self::Popular)
    }

    /// Request path relative to the API base.
    pub fn path(&self) -> String {
        match self {
            Self::Home => "v1/timeline".to_string(),
            Self::Replies { tweet_id } => format!("v1/tweets/{tweet_id}/replies"),
            Self::UserTweets { user_id } => format!("v1/users/{user_id}/tweets"),
            Self::Popular => "v1/tweets/popular".to_string(),
        }
    }
}

/// Pagination position. Tokens are opaque; the loader never parses them.
///
/// `Scalar(None)` / `Compound { None, None }` mean "first page".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Scalar(Option<String>),
    /// Tie-break pair for score-ranked feeds: `like` is the position in
    /// the score order, `id` breaks ties among equal scores.
    Compound {
        like: Option<String>,
        id: Option<String>,
    },
}

impl Cursor {
    /// First-page cursor for a feed kind.
    pub fn start(kind: &FeedKind) -> Self {
        if kind.is_compound() {
            Self::Compound { like: None, id: None }
        } else {
            Self::Scalar(None)
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(
            self,
            Self::Scalar(None) | Self::Compound { like: None, id: None }
        )
    }

    /// The position after a page that carried `next`. Both halves of a
    /// compound cursor come from the same response; a compound feed that
    /// answered with a lone scalar token advances the tie-break id and
    /// carries the score position forward unchanged (the page parser flags
    /// that shape as suspect).
    pub(crate) fn advanced(&self, next: crate::page::NextCursor) -> Self {
        use crate::page::NextCursor as N;
        match (self, next) {
            (Self::Scalar(_), N::Scalar(id)) => Self::Scalar(Some(id)),
            (Self::Scalar(_), N::Compound { id, .. }) => Self::Scalar(Some(id)),
            (Self::Compound { .. }, N::Compound { like, id }) => Self::Compound {
                like: Some(like),
                id: Some(id),
            },
            (Self::Compound { like, .. }, N::Scalar(id)) => Self::Compound {
                like: like.clone(),
                id: Some(id),
            },
        }
    }
}

/// Immutable description of one page request.
///
/// ```
/// use perch_feed::{FeedKind, FeedQuery};
///
/// let q = FeedQuery::first_page(FeedKind::Popular, 30).with_day_count(15);
/// assert_eq!(q.path(), "v1/tweets/popular");
/// assert_eq!(
///     q.params(),
///     vec![("limit", "30".to_string()), ("day_count", "15".to_string())]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub kind: FeedKind,
    pub cursor: Cursor,
    /// Requested page size. Passed through as given; the server clamps to
    /// its own bounds.
    pub limit: u32,
    /// Ranking window in days (popular feed only).
    pub day_count: Option<u32>,
}

impl FeedQuery {
    pub fn first_page(kind: FeedKind, limit: u32) -> Self {
        let cursor = Cursor::start(&kind);
        Self {
            kind,
            cursor,
            limit,
            day_count: None,
        }
    }

    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_day_count(mut self, days: u32) -> Self {
        self.day_count = Some(days);
        self
    }

    pub fn path(&self) -> String {
        self.kind.path()
    }

    /// Query parameters in the order the API documents them. Absent cursor
    /// halves are omitted rather than sent empty.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(4);
        match &self.cursor {
            Cursor::Scalar(Some(token)) => params.push(("cursor", token.clone())),
            Cursor::Scalar(None) => {}
            Cursor::Compound { like, id } => {
                if let Some(like) = like {
                    params.push(("cursor_like", like.clone()));
                }
                if let Some(id) = id {
                    params.push(("cursor_id", id.clone()));
                }
            }
        }
        params.push(("limit", self.limit.to_string()));
        if let Some(days) = self.day_count {
            params.push(("day_count", days.to_string()));
        }
        params
    }
}
