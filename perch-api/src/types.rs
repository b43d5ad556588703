use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Convenience view over one feed item for compact rendering. Feed items
/// stay opaque `Value`s in the loader; this parse is best-effort and only
/// for display.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Tweet {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "likeCount")]
    pub like_count: Option<u64>,
    #[serde(default, rename = "replyCount")]
    pub reply_count: Option<u64>,
    #[serde(default, rename = "repostCount")]
    pub repost_count: Option<u64>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
}

impl Tweet {
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// A media attachment reference carried by a tweet.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaRef {
    pub storage_key: String,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Body of `POST /v1/posts`.
#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub content: String,
    pub in_reply_to_tweet: Option<u64>,
    pub medias: Vec<MediaUpload>,
}

/// One attachment in a post body: the file inlined as a data URL plus the
/// metadata the client could extract for it.
#[derive(Debug, Clone, Serialize)]
pub struct MediaUpload {
    pub data_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tweet_view_reads_counts_and_media() {
        let t = Tweet::from_value(&json!({
            "username": "ada",
            "content": "hello",
            "likeCount": 3,
            "replyCount": 1,
            "repostCount": 0,
            "media": [{"storage_key": "k1", "media_type": "image", "mime_type": "image/png"}]
        }));
        assert_eq!(t.username.as_deref(), Some("ada"));
        assert_eq!(t.like_count, Some(3));
        assert_eq!(t.media.len(), 1);
        assert_eq!(t.media[0].storage_key, "k1");
    }

    #[test]
    fn tweet_view_tolerates_unknown_shapes() {
        let t = Tweet::from_value(&json!({"weird": true}));
        assert!(t.username.is_none());
        assert!(t.media.is_empty());
    }

    #[test]
    fn media_upload_omits_absent_metadata() {
        let up = MediaUpload {
            data_url: "data:image/png;base64,AAAA".into(),
            mime_type: Some("image/png".into()),
            width: None,
            height: None,
            duration_ms: None,
        };
        let v = serde_json::to_value(&up).unwrap();
        assert!(v.get("width").is_none());
        assert!(v.get("duration_ms").is_none());
        assert_eq!(v["mime_type"], "image/png");
    }
}
