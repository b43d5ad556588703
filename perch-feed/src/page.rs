//! One fetched page, normalized from the raw response body.

use serde_json::Value;

use crate::loader::FeedError;
use crate::query::FeedKind;

/// Pagination token(s) carried by a page, already matched to the feed kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextCursor {
    Scalar(String),
    Compound { like: String, id: String },
}

/// Result of one page fetch. `items` keeps server rank order; `next` is
/// `None` when the feed is exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub items: Vec<Value>,
    pub next: Option<NextCursor>,
}

impl FeedPage {
    /// Validate and normalize a decoded response body.
    ///
    /// The contract is `{ items: [...], next_cursor: scalar | null }`, with
    /// the popular feed carrying `cursor_like` + `cursor_id` instead. Any
    /// other top-level shape is a contract violation. Cursor tokens may be
    /// strings or integers on the wire; both normalize to strings here.
    pub fn from_value(kind: &FeedKind, value: Value) -> Result<Self, FeedError> {
        let Value::Object(mut map) = value else {
            return Err(FeedError::Contract(
                "top-level response is not a JSON object".into(),
            ));
        };

        let items = match map.remove("items") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(FeedError::Contract("`items` is not an array".into())),
            None => return Err(FeedError::Contract("response lacks `items`".into())),
        };

        let next_cursor = scalar_token(map.get("next_cursor"), "next_cursor")?;
        let like = scalar_token(map.get("cursor_like"), "cursor_like")?;
        let id = scalar_token(map.get("cursor_id"), "cursor_id")?;

        let next = if kind.is_compound() {
            match (like, id) {
                (Some(like), Some(id)) => Some(NextCursor::Compound { like, id }),
                (None, None) => next_cursor.map(|id| {
                    // Legacy single-token shape on a compound feed: the
                    // score position cannot advance with the id. Accepted,
                    // but loud: pagination past the first score bucket is
                    // unreliable on servers that answer this way.
                    tracing::warn!(
                        cursor_id = %id,
                        "feed.popular.scalar_cursor: response carried next_cursor without cursor_like"
                    );
                    NextCursor::Scalar(id)
                }),
                _ => {
                    return Err(FeedError::Contract(
                        "popular page carried only one of cursor_like/cursor_id".into(),
                    ));
                }
            }
        } else {
            next_cursor.map(NextCursor::Scalar)
        };

        Ok(Self { items, next })
    }
}

/// A cursor token on the wire: string or integer, with null/absent meaning
/// "no token". Any other type is a contract violation.
fn scalar_token(value: Option<&Value>, field: &str) -> Result<Option<String>, FeedError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(FeedError::Contract(format!(
            "`{field}` is not a scalar token: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_feed_page_normalizes() {
        let page = FeedPage::from_value(
            &FeedKind::Home,
            json!({"items": [{"id": 1}, {"id": 2}], "next_cursor": "2"}),
        )
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next, Some(NextCursor::Scalar("2".into())));
    }

    #[test]
    fn integer_cursor_tokens_normalize_to_strings() {
        let page =
            FeedPage::from_value(&FeedKind::Home, json!({"items": [], "next_cursor": 17})).unwrap();
        assert_eq!(page.next, Some(NextCursor::Scalar("17".into())));
    }

    #[test]
    fn null_and_absent_next_cursor_mean_end_of_feed() {
        let page =
            FeedPage::from_value(&FeedKind::Home, json!({"items": [], "next_cursor": null}))
                .unwrap();
        assert_eq!(page.next, None);

        let page = FeedPage::from_value(&FeedKind::Home, json!({"items": []})).unwrap();
        assert_eq!(page.next, None);
    }

    #[test]
    fn missing_items_is_a_contract_violation() {
        let err = FeedPage::from_value(&FeedKind::Home, json!({"next_cursor": "2"})).unwrap_err();
        assert!(matches!(err, FeedError::Contract(_)));
    }

    #[test]
    fn non_array_items_is_a_contract_violation() {
        let err = FeedPage::from_value(&FeedKind::Home, json!({"items": "nope"})).unwrap_err();
        assert!(matches!(err, FeedError::Contract(_)));
    }

    #[test]
    fn non_object_body_is_a_contract_violation() {
        let err = FeedPage::from_value(&FeedKind::Home, json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, FeedError::Contract(_)));
    }

    #[test]
    fn popular_page_reads_both_cursor_halves_together() {
        let page = FeedPage::from_value(
            &FeedKind::Popular,
            json!({"items": [], "cursor_like": "5", "cursor_id": "42"}),
        )
        .unwrap();
        assert_eq!(
            page.next,
            Some(NextCursor::Compound {
                like: "5".into(),
                id: "42".into()
            })
        );
    }

    #[test]
    fn popular_page_with_half_a_cursor_is_a_contract_violation() {
        let err = FeedPage::from_value(
            &FeedKind::Popular,
            json!({"items": [], "cursor_like": "5"}),
        )
        .unwrap_err();
        assert!(matches!(err, FeedError::Contract(_)));
    }

    #[test]
    fn popular_page_with_legacy_scalar_cursor_is_accepted() {
        let page = FeedPage::from_value(
            &FeedKind::Popular,
            json!({"items": [], "next_cursor": "42"}),
        )
        .unwrap();
        assert_eq!(page.next, Some(NextCursor::Scalar("42".into())));
    }

    #[test]
    fn stray_compound_fields_on_scalar_feeds_are_ignored() {
        let page = FeedPage::from_value(
            &FeedKind::Home,
            json!({"items": [], "next_cursor": "9", "cursor_like": "5", "cursor_id": "1"}),
        )
        .unwrap();
        assert_eq!(page.next, Some(NextCursor::Scalar("9".into())));
    }
}
