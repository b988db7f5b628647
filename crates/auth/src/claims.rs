//! Access token claims
//!
//! The identity provider issues HS256 JWT access tokens. Porter only reads
//! them; it never mints production tokens.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Claims carried by the identity provider's access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (stable identity ID)
    #[serde(rename = "sub")]
    pub subject: String,

    /// Email address
    #[serde(default)]
    pub email: String,

    /// Provider-side role of the token (e.g. "authenticated")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Federated profile attributes (name, avatar, ...)
    #[serde(default)]
    pub user_metadata: HashMap<String, serde_json::Value>,

    /// Provider session ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Expiration time (Unix timestamp)
    #[serde(rename = "exp")]
    pub expires_at: i64,

    /// Issued at (Unix timestamp)
    #[serde(rename = "iat", default)]
    pub issued_at: i64,

    /// Issuer
    #[serde(rename = "iss", default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl AccessTokenClaims {
    /// Look up a string attribute in the federated metadata
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Strip an optional `Bearer ` prefix and surrounding whitespace
pub fn bare_token(raw: &str) -> Option<&str> {
    let token = raw.trim();
    let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
    if token.is_empty() { None } else { Some(token) }
}
