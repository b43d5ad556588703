//! Types and helpers shared across the perch workspace.
//!
//! This crate is intentionally small so every other crate can depend on it
//! without pulling in transitive weight: the centralised tracing setup in
//! [`observability`], the console output format switch, and a masking helper
//! for echoing credentials into logs.

use serde::{Deserialize, Serialize};

pub mod observability;

/// How the console renders API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Compact single-line JSON.
    Json,
    /// Indented JSON for reading by hand.
    Pretty,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Pretty
    }
}

/// Credentials attached to API requests.
///
/// The reference console kept these in per-page form fields and cookies;
/// here they are explicit state handed to the client, so everything above
/// the transport stays testable without a browser environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token sent as `Authorization: Bearer <token>`.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Anti-forgery token sent as `X-XSRF-TOKEN` on mutating requests.
    #[serde(default)]
    pub csrf_token: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            csrf_token: None,
        }
    }
}

/// Shorten a secret for log output, keeping only a recognisable prefix.
///
/// ```
/// assert_eq!(perch_common::mask_secret("abcdefghijklmnop"), "abcdefgh…");
/// assert_eq!(perch_common::mask_secret("short"), "<set>");
/// assert_eq!(perch_common::mask_secret(""), "<empty>");
/// ```
pub fn mask_secret(value: &str) -> String {
    if value.is_empty() {
        "<empty>".to_string()
    } else if value.len() <= 8 {
        "<set>".to_string()
    } else {
        let head: String = value.chars().take(8).collect();
        format!("{head}…")
    }
}
