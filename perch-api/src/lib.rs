//! Typed client for the social backend's `/v1` surface.
//!
//! Submodules provide the HTTP client wrapper around the shared transport,
//! strongly typed request/response models, the token-grant normalization
//! adapter for the backend's varying auth response shapes, and media
//! payload preparation for posting with attachments.

use thiserror::Error;

pub mod auth;
pub mod client;
pub mod media;
pub mod types;

pub use client::SocialApi;

/// Failures above the raw transport.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Http(#[from] perch_http::HttpError),
    /// An auth endpoint answered without any recognisable access token.
    #[error("token grant lacks an access token: {0}")]
    Token(String),
    /// A local media file could not be turned into an upload payload.
    #[error("media file rejected: {0}")]
    Media(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
