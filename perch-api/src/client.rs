//! The backend client: one method per console operation.

use std::borrow::Cow;

use async_trait::async_trait;
use perch_common::Credentials;
use perch_feed::{FeedError, FeedPage, FeedQuery, FeedTransport};
use perch_http::{Auth, HttpClient, HttpError, RequestOpts};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

use crate::ApiError;
use crate::auth::{IssuedToken, SignupRequest, issued_token_from_value};
use crate::media::LoadedMedia;
use crate::types::NewPost;

/// Client for the social backend. Owns the shared HTTP transport and the
/// credentials attached to requests; mutating endpoints send the bearer
/// token plus the `X-XSRF-TOKEN` header, reads send the bearer alone.
#[derive(Clone)]
pub struct SocialApi {
    http: HttpClient,
    creds: Credentials,
}

impl SocialApi {
    pub fn new(http: HttpClient, creds: Credentials) -> Self {
        Self { http, creds }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.creds
    }

    pub fn set_access_token(&mut self, token: String) {
        self.creds.access_token = Some(token);
    }

    pub fn set_csrf_token(&mut self, token: String) {
        self.creds.csrf_token = Some(token);
    }

    fn bearer(&self) -> Option<Auth<'_>> {
        self.creds.access_token.as_deref().map(Auth::Bearer)
    }

    fn read_opts(&self) -> RequestOpts<'_> {
        RequestOpts {
            auth: self.bearer(),
            ..Default::default()
        }
    }

    fn write_opts(&self) -> Result<RequestOpts<'_>, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(csrf) = &self.creds.csrf_token {
            let value = HeaderValue::from_str(csrf)
                .map_err(|e| HttpError::Build(format!("invalid X-XSRF-TOKEN header: {e}")))?;
            headers.insert(HeaderName::from_static("x-xsrf-token"), value);
        }
        Ok(RequestOpts {
            auth: self.bearer(),
            headers: Some(headers),
            ..Default::default()
        })
    }

    async fn mutate(&self, method: Method, path: &str) -> Result<Option<Value>, ApiError> {
        let opts = self.write_opts()?;
        Ok(self
            .http
            .request_value(method, path, None::<&Value>, opts)
            .await?)
    }

    // ==============================
    // Auth
    // ==============================

    pub async fn signup(&self, req: &SignupRequest) -> Result<Option<Value>, ApiError> {
        let out = self
            .http
            .request_value(Method::POST, "v1/auth/signup", Some(req), RequestOpts::default())
            .await?;
        tracing::info!(username = %req.username, "auth.signup.ok");
        Ok(out)
    }

    pub async fn request_magic_link(&self, email: &str) -> Result<Option<Value>, ApiError> {
        let out = self
            .http
            .request_value(
                Method::POST,
                "v1/auth/magic-link/request",
                Some(&json!({ "email": email })),
                RequestOpts::default(),
            )
            .await?;
        tracing::info!("auth.magic_link.requested");
        Ok(out)
    }

    /// Exchange a magic-link token for an access token.
    pub async fn consume_magic_link(&self, token: &str) -> Result<IssuedToken, ApiError> {
        let value: Value = self
            .http
            .post_json(
                "v1/auth/magic-link/consume",
                &json!({ "token": token }),
                RequestOpts::default(),
            )
            .await?;
        let issued = issued_token_from_value(value)?;
        tracing::info!(ttl = ?issued.expires_in_seconds, "auth.magic_link.consumed");
        Ok(issued)
    }

    pub async fn verify(&self, token: &str) -> Result<Option<Value>, ApiError> {
        Ok(self
            .http
            .request_value(
                Method::POST,
                "v1/auth/verify",
                Some(&json!({ "token": token })),
                RequestOpts::default(),
            )
            .await?)
    }

    /// Trade the refresh-token cookie for a fresh access token.
    pub async fn refresh(&self) -> Result<IssuedToken, ApiError> {
        let value = self
            .http
            .request_value(Method::POST, "v1/auth/refresh", None::<&Value>, RequestOpts::default())
            .await?
            .ok_or_else(|| ApiError::Token("empty refresh response".into()))?;
        let issued = issued_token_from_value(value)?;
        tracing::info!(ttl = ?issued.expires_in_seconds, "auth.refreshed");
        Ok(issued)
    }

    /// Prime the anti-forgery cookie and pick up the token when the server
    /// echoes it in the body. The token is remembered for later writes.
    pub async fn fetch_csrf(&mut self) -> Result<Option<String>, ApiError> {
        let out = self
            .http
            .request_value(Method::GET, "v1/auth/csrf", None::<&Value>, RequestOpts::default())
            .await?;
        let token = out
            .as_ref()
            .and_then(|v| v.get("token"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(tok) = &token {
            self.creds.csrf_token = Some(tok.clone());
        }
        Ok(token)
    }

    // ==============================
    // Social graph & engagement
    // ==============================

    pub async fn follow(&self, user_id: u64) -> Result<Option<Value>, ApiError> {
        self.mutate(Method::PUT, &format!("v1/users/{user_id}/follow")).await
    }

    pub async fn unfollow(&self, user_id: u64) -> Result<Option<Value>, ApiError> {
        self.mutate(Method::DELETE, &format!("v1/users/{user_id}/follow")).await
    }

    pub async fn followers(&self, user_id: u64) -> Result<Value, ApiError> {
        Ok(self
            .http
            .get_json(&format!("v1/users/{user_id}/followers"), self.read_opts())
            .await?)
    }

    pub async fn following(&self, user_id: u64) -> Result<Value, ApiError> {
        Ok(self
            .http
            .get_json(&format!("v1/users/{user_id}/following"), self.read_opts())
            .await?)
    }

    pub async fn like(&self, tweet_id: u64) -> Result<Option<Value>, ApiError> {
        self.mutate(Method::PUT, &format!("v1/tweets/{tweet_id}/like")).await
    }

    pub async fn unlike(&self, tweet_id: u64) -> Result<Option<Value>, ApiError> {
        self.mutate(Method::DELETE, &format!("v1/tweets/{tweet_id}/like")).await
    }

    pub async fn repost(&self, tweet_id: u64) -> Result<Option<Value>, ApiError> {
        self.mutate(Method::POST, &format!("v1/tweets/{tweet_id}/repost")).await
    }

    pub async fn unrepost(&self, tweet_id: u64) -> Result<Option<Value>, ApiError> {
        self.mutate(Method::DELETE, &format!("v1/tweets/{tweet_id}/repost")).await
    }

    // ==============================
    // Posting
    // ==============================

    pub async fn post(&self, post: &NewPost) -> Result<Option<Value>, ApiError> {
        let opts = self.write_opts()?;
        let out = self
            .http
            .request_value(Method::POST, "v1/posts", Some(post), opts)
            .await?;
        tracing::info!(medias = post.medias.len(), "post.created");
        Ok(out)
    }

    /// Reply with optional attachments. The server takes a multipart form:
    /// a `postForm` JSON part plus one `mediaFiles` part per file.
    pub async fn reply(
        &self,
        tweet_id: u64,
        content: &str,
        files: &[LoadedMedia],
    ) -> Result<Option<Value>, ApiError> {
        let post_form = json!({
            "content": content,
            "in_reply_to_tweet": tweet_id,
        });
        let mut form = Form::new().part(
            "postForm",
            Part::text(post_form.to_string())
                .mime_str("application/json")
                .map_err(|e| ApiError::Media(e.to_string()))?,
        );
        for file in files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| ApiError::Media(e.to_string()))?;
            form = form.part("mediaFiles", part);
        }

        let out = self
            .http
            .post_multipart(&format!("v1/tweets/{tweet_id}/reply"), form, self.write_opts()?)
            .await?;
        tracing::info!(tweet_id, files = files.len(), "reply.created");
        Ok(out)
    }

    // ==============================
    // Lookup
    // ==============================

    pub async fn search_users(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Value, ApiError> {
        let mut query: Vec<(&str, Cow<'_, str>)> = vec![("prefix", prefix.into())];
        if let Some(c) = cursor {
            query.push(("cursor", c.into()));
        }
        query.push(("limit", limit.to_string().into()));

        let mut opts = self.write_opts()?;
        opts.query = Some(query);
        Ok(self.http.get_json("v1/users/search", opts).await?)
    }

    /// Download one stored media object.
    pub async fn media(&self, storage_key: &str) -> Result<Vec<u8>, ApiError> {
        let opts = self.write_opts()?;
        Ok(self.http.get_bytes(&format!("media/{storage_key}"), opts).await?)
    }
}

// ==============================
// Feed transport
// ==============================

fn feed_error(err: HttpError) -> FeedError {
    match err {
        HttpError::Status { status, reason, body } => FeedError::Status {
            status: status.as_u16(),
            reason,
            body,
        },
        HttpError::Contract { message, .. } => FeedError::Contract(message),
        // URL/build problems stop the request from ever being sent, which
        // is the same failure class as a network error from the caller's
        // point of view.
        other => FeedError::Transport(other.to_string()),
    }
}

#[async_trait]
impl FeedTransport for SocialApi {
    /// One page fetch, exactly as asked: zero retries so the loader's
    /// one-request-per-load contract holds even though the shared client
    /// can retry elsewhere.
    async fn fetch_page(&self, query: &FeedQuery) -> Result<FeedPage, FeedError> {
        let params = query.params();
        let wire: Vec<(&str, Cow<'_, str>)> = params
            .iter()
            .map(|(k, v)| (*k, Cow::from(v.as_str())))
            .collect();

        let value: Value = self
            .http
            .get_json(
                &query.path(),
                RequestOpts {
                    auth: self.bearer(),
                    query: Some(wire),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
            .map_err(feed_error)?;

        FeedPage::from_value(&query.kind, value)
    }
}
