//! Auth request/response models and the token-grant normalization adapter.
//!
//! Different builds of the backend name the same logical fields
//! differently: the magic-link consume endpoint has been seen answering
//! `accessToken`, `access_token`, or `token`, and the refresh endpoint
//! `accessToken` or `jwt`, with a similar spread for the TTL. That
//! ambiguity is absorbed here, at the boundary; everything inward works
//! with one canonical [`IssuedToken`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ApiError;

/// Body of `POST /v1/auth/signup`.
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub password: String,
    pub locale: String,
    pub timezone: String,
}

/// Canonical access-token grant, whatever the wire shape was.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
}

/// Wire shape of a token grant before normalization.
#[derive(Debug, Default, Deserialize)]
pub struct RawTokenGrant {
    #[serde(
        default,
        alias = "accessToken",
        alias = "token",
        alias = "jwt"
    )]
    access_token: Option<String>,
    #[serde(
        default,
        alias = "expiresInSeconds",
        alias = "expires_in_seconds",
        alias = "expires_in",
        alias = "accessTtlSecond"
    )]
    expires: Option<Value>,
}

impl RawTokenGrant {
    /// Collapse the duck-typed wire shape into an [`IssuedToken`].
    pub fn normalize(self) -> Result<IssuedToken, ApiError> {
        let access_token = match self.access_token {
            Some(token) if !token.is_empty() => token,
            _ => {
                return Err(ApiError::Token(
                    "no access token field in response".into(),
                ));
            }
        };
        // TTL may arrive as a number or a numeric string; anything else is
        // dropped rather than failing the whole grant.
        let expires_in_seconds = match self.expires {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        Ok(IssuedToken {
            access_token,
            expires_in_seconds,
        })
    }
}

/// Parse and normalize a token-grant response body.
pub fn issued_token_from_value(value: Value) -> Result<IssuedToken, ApiError> {
    let raw: RawTokenGrant = serde_json::from_value(value)
        .map_err(|e| ApiError::Token(format!("unreadable token grant: {e}")))?;
    raw.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camel_case_grant_normalizes() {
        let tok = issued_token_from_value(json!({
            "accessToken": "abc",
            "expiresInSeconds": 900
        }))
        .unwrap();
        assert_eq!(tok.access_token, "abc");
        assert_eq!(tok.expires_in_seconds, Some(900));
    }

    #[test]
    fn snake_case_grant_normalizes() {
        let tok = issued_token_from_value(json!({
            "access_token": "abc",
            "expires_in": 600
        }))
        .unwrap();
        assert_eq!(tok.access_token, "abc");
        assert_eq!(tok.expires_in_seconds, Some(600));
    }

    #[test]
    fn bare_token_field_normalizes() {
        let tok = issued_token_from_value(json!({"token": "abc"})).unwrap();
        assert_eq!(tok.access_token, "abc");
        assert_eq!(tok.expires_in_seconds, None);
    }

    #[test]
    fn refresh_shape_with_jwt_and_ttl_field_normalizes() {
        let tok = issued_token_from_value(json!({
            "jwt": "abc",
            "accessTtlSecond": "1200"
        }))
        .unwrap();
        assert_eq!(tok.access_token, "abc");
        assert_eq!(tok.expires_in_seconds, Some(1200));
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = issued_token_from_value(json!({"expires_in": 60})).unwrap_err();
        assert!(matches!(err, ApiError::Token(_)));
    }

    #[test]
    fn empty_token_is_an_error() {
        let err = issued_token_from_value(json!({"token": ""})).unwrap_err();
        assert!(matches!(err, ApiError::Token(_)));
    }

    #[test]
    fn unparseable_ttl_is_dropped() {
        let tok = issued_token_from_value(json!({
            "token": "abc",
            "expires_in": {"weird": true}
        }))
        .unwrap();
        assert_eq!(tok.expires_in_seconds, None);
    }
}
