//! Authenticated identity
//!
//! `Identity` is the principal as known by the external identity provider.
//! Porter treats it as read-only, apart from mirroring the avatar into the
//! profile during bootstrap.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::claims::AccessTokenClaims;

/// Metadata keys checked (in order) for a display name
const NAME_KEYS: [&str; 3] = ["full_name", "name", "user_name"];

/// Metadata keys checked (in order) for an avatar
const AVATAR_KEYS: [&str; 2] = ["avatar_url", "picture"];

/// Authenticated principal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable external ID
    pub id: String,

    /// Email address
    #[serde(default)]
    pub email: String,

    /// Display name from federated attributes
    #[serde(default)]
    pub display_name: Option<String>,

    /// Avatar URL from federated attributes
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Create an identity with minimal info
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
            avatar_url: None,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the avatar URL
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }

    /// Name to store on the profile
    ///
    /// Falls back to the local part of the email when the provider sent no
    /// name.
    pub fn full_name(&self) -> String {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self
                .email
                .split('@')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or(self.id.as_str())
                .to_string(),
        }
    }

    /// Build from verified access token claims
    pub fn from_claims(claims: &AccessTokenClaims) -> Self {
        Self {
            id: claims.subject.clone(),
            email: claims.email.clone(),
            display_name: NAME_KEYS
                .iter()
                .find_map(|k| claims.metadata_str(k))
                .map(String::from),
            avatar_url: AVATAR_KEYS
                .iter()
                .find_map(|k| claims.metadata_str(k))
                .map(String::from),
        }
    }

    /// Build from the provider's user resource (`GET /user`)
    pub fn from_provider_user(user: &ProviderUser) -> Self {
        let lookup = |keys: &[&str]| {
            keys.iter().find_map(|k| {
                user.user_metadata
                    .get(*k)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(String::from)
            })
        };

        Self {
            id: user.id.clone(),
            email: user.email.clone().unwrap_or_default(),
            display_name: lookup(&NAME_KEYS),
            avatar_url: lookup(&AVATAR_KEYS),
        }
    }
}

/// User resource as returned by the identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    /// Stable user ID
    pub id: String,
    /// Email address (absent for phone-only accounts)
    #[serde(default)]
    pub email: Option<String>,
    /// Federated attributes
    #[serde(default)]
    pub user_metadata: HashMap<String, serde_json::Value>,
}
