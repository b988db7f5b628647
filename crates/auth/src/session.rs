//! Session resolution
//!
//! Runs on every request: turns the caller's cookie material into an
//! authenticated identity, refreshing near-expiry credentials on the way.
//! The resolver never fails. Every provider problem collapses into
//! "unauthenticated" plus an instruction for what to do with the cookies.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::claims::bare_token;
use crate::error::AuthError;
use crate::identity::Identity;
use crate::provider::IdentityProvider;

/// Default window before expiry in which credentials are refreshed
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Credential material as carried by the transport (all parts optional)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Access token
    pub access_token: Option<String>,
    /// Refresh token
    pub refresh_token: Option<String>,
    /// Access token expiry (Unix seconds)
    pub expires_at: Option<i64>,
}

impl Credentials {
    /// No credential material at all
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

impl From<SessionTokens> for Credentials {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            expires_at: Some(tokens.expires_at),
        }
    }
}

/// Complete session issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    /// Access token
    pub access_token: String,
    /// Refresh token
    pub refresh_token: String,
    /// Access token expiry (Unix seconds)
    pub expires_at: i64,
}

/// What the transport should do with the session cookies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialAction {
    /// Write these credentials back (possibly unchanged)
    Emit(Credentials),
    /// Remove the session cookies
    Clear,
    /// Leave the cookies as they are
    Keep,
}

/// Outcome of resolving a request's credentials
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    /// Authenticated identity, `None` when unauthenticated
    pub identity: Option<Identity>,
    /// Cookie instruction for the response
    pub credentials: CredentialAction,
}

impl ResolvedSession {
    fn anonymous(credentials: CredentialAction) -> Self {
        Self {
            identity: None,
            credentials,
        }
    }

    /// Whether the caller is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Validates and refreshes credentials against the identity provider
#[derive(Clone)]
pub struct SessionResolver {
    provider: Arc<dyn IdentityProvider>,
    refresh_margin: Duration,
}

impl std::fmt::Debug for SessionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionResolver")
            .field("provider", &self.provider.name())
            .field("refresh_margin", &self.refresh_margin)
            .finish()
    }
}

impl SessionResolver {
    /// Create a resolver with the default refresh margin
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        }
    }

    /// Set the refresh margin
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Resolve credentials at the current time
    pub async fn resolve(&self, creds: Credentials) -> ResolvedSession {
        self.resolve_at(creds, Utc::now().timestamp()).await
    }

    /// Resolve credentials at `now` (Unix seconds)
    ///
    /// The expiry cookie is only a hint. An access token the provider
    /// rejects still gets one refresh attempt per request when a refresh
    /// token is present.
    pub async fn resolve_at(&self, creds: Credentials, now: i64) -> ResolvedSession {
        let access = creds.access_token.as_deref().and_then(bare_token);
        let refresh = creds.refresh_token.as_deref().and_then(bare_token);

        if access.is_none() && refresh.is_none() {
            return ResolvedSession::anonymous(CredentialAction::Keep);
        }

        let mut current = Credentials {
            access_token: access.map(String::from),
            refresh_token: refresh.map(String::from),
            expires_at: creds.expires_at,
        };
        let mut refreshed = false;
        let mut rotated = false;

        if let Some(refresh_token) = refresh
            && self.needs_refresh(&current, now)
        {
            refreshed = true;
            match self.refresh(refresh_token).await {
                Refresh::Issued(tokens) => {
                    current = tokens.into();
                    rotated = true;
                }
                Refresh::Unavailable => {
                    let still_valid = current.access_token.is_some()
                        && current.expires_at.is_none_or(|exp| exp > now);
                    if !still_valid {
                        return ResolvedSession::anonymous(CredentialAction::Keep);
                    }
                }
                Refresh::Rejected => return ResolvedSession::anonymous(CredentialAction::Clear),
            }
        }

        let Some(access_token) = current.access_token.clone() else {
            // Only a refresh token, and it could not be used.
            return ResolvedSession::anonymous(CredentialAction::Keep);
        };

        match self.provider.identity(&access_token).await {
            Ok(identity) => ResolvedSession {
                identity: Some(identity),
                credentials: CredentialAction::Emit(current),
            },
            Err(e) if e.is_credential_rejection() && !refreshed => {
                let Some(refresh_token) = current.refresh_token.clone() else {
                    debug!(error = %e, "access token rejected");
                    return ResolvedSession::anonymous(CredentialAction::Clear);
                };
                debug!(error = %e, "access token rejected, trying refresh");
                match self.refresh(&refresh_token).await {
                    Refresh::Issued(tokens) => self.lookup_refreshed(tokens.into()).await,
                    Refresh::Unavailable => ResolvedSession::anonymous(CredentialAction::Keep),
                    Refresh::Rejected => ResolvedSession::anonymous(CredentialAction::Clear),
                }
            }
            Err(e) => self.lookup_failed(e, rotated, current),
        }
    }

    /// Identity lookup with credentials issued during this request
    async fn lookup_refreshed(&self, current: Credentials) -> ResolvedSession {
        let Some(access_token) = current.access_token.clone() else {
            return ResolvedSession::anonymous(CredentialAction::Keep);
        };
        match self.provider.identity(&access_token).await {
            Ok(identity) => ResolvedSession {
                identity: Some(identity),
                credentials: CredentialAction::Emit(current),
            },
            Err(e) => self.lookup_failed(e, true, current),
        }
    }

    fn lookup_failed(
        &self,
        error: AuthError,
        rotated: bool,
        current: Credentials,
    ) -> ResolvedSession {
        if error.is_upstream() {
            warn!(error = %error, "identity lookup unavailable");
            // Tokens issued by a refresh this request are written regardless
            let credentials = if rotated {
                CredentialAction::Emit(current)
            } else {
                CredentialAction::Keep
            };
            return ResolvedSession::anonymous(credentials);
        }
        debug!(error = %error, "access token rejected");
        ResolvedSession::anonymous(CredentialAction::Clear)
    }

    async fn refresh(&self, refresh_token: &str) -> Refresh {
        match self.provider.refresh(refresh_token).await {
            Ok(tokens) => {
                debug!(provider = self.provider.name(), "session refreshed");
                Refresh::Issued(tokens)
            }
            Err(e) if e.is_upstream() => {
                warn!(error = %e, "session refresh unavailable");
                Refresh::Unavailable
            }
            Err(e) => {
                debug!(error = %e, "refresh token rejected");
                Refresh::Rejected
            }
        }
    }

    fn needs_refresh(&self, creds: &Credentials, now: i64) -> bool {
        if creds.access_token.is_none() {
            return true;
        }
        let margin = i64::try_from(self.refresh_margin.as_secs()).unwrap_or(i64::MAX);
        match creds.expires_at {
            // The expiry comes from a client cookie and may be any i64
            Some(exp) => exp.saturating_sub(now) <= margin,
            None => false,
        }
    }
}

/// Outcome of one refresh attempt
enum Refresh {
    Issued(SessionTokens),
    Unavailable,
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticIdentityProvider;

    const NOW: i64 = 1_900_000_000;

    fn provider() -> Arc<StaticIdentityProvider> {
        Arc::new(
            StaticIdentityProvider::new()
                .with_user("at-1", Identity::new("u1", "u1@example.com"))
                .with_user("at-2", Identity::new("u1", "u1@example.com"))
                .with_refresh(
                    "rt-1",
                    SessionTokens {
                        access_token: "at-2".into(),
                        refresh_token: "rt-2".into(),
                        expires_at: NOW + 3600,
                    },
                ),
        )
    }

    fn creds(access: Option<&str>, refresh: Option<&str>, expires_at: Option<i64>) -> Credentials {
        Credentials {
            access_token: access.map(String::from),
            refresh_token: refresh.map(String::from),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_no_credentials() {
        let resolver = SessionResolver::new(provider());
        let resolved = resolver.resolve_at(Credentials::default(), NOW).await;
        assert!(!resolved.is_authenticated());
        assert_eq!(resolved.credentials, CredentialAction::Keep);
    }

    #[tokio::test]
    async fn test_valid_session_is_reemitted_unchanged() {
        let resolver = SessionResolver::new(provider());
        let input = creds(Some("at-1"), Some("rt-1"), Some(NOW + 3600));
        let resolved = resolver.resolve_at(input.clone(), NOW).await;

        assert_eq!(resolved.identity.unwrap().id, "u1");
        assert_eq!(resolved.credentials, CredentialAction::Emit(input));
    }

    #[tokio::test]
    async fn test_near_expiry_is_refreshed() {
        let resolver = SessionResolver::new(provider());
        let resolved = resolver
            .resolve_at(creds(Some("at-1"), Some("rt-1"), Some(NOW + 30)), NOW)
            .await;

        assert!(resolved.is_authenticated());
        assert_eq!(
            resolved.credentials,
            CredentialAction::Emit(creds(Some("at-2"), Some("rt-2"), Some(NOW + 3600)))
        );
    }

    #[tokio::test]
    async fn test_refresh_margin_is_configurable() {
        let resolver =
            SessionResolver::new(provider()).with_refresh_margin(Duration::from_secs(10));
        let input = creds(Some("at-1"), Some("rt-1"), Some(NOW + 30));
        let resolved = resolver.resolve_at(input.clone(), NOW).await;
        assert_eq!(resolved.credentials, CredentialAction::Emit(input));
    }

    #[tokio::test]
    async fn test_refresh_only_credentials() {
        let resolver = SessionResolver::new(provider());
        let resolved = resolver
            .resolve_at(creds(None, Some("rt-1"), None), NOW)
            .await;
        assert!(resolved.is_authenticated());
        assert!(matches!(
            resolved.credentials,
            CredentialAction::Emit(ref c) if c.access_token.as_deref() == Some("at-2")
        ));
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears() {
        let resolver = SessionResolver::new(provider());
        let resolved = resolver
            .resolve_at(creds(Some("at-1"), Some("revoked"), Some(NOW + 5)), NOW)
            .await;
        assert!(!resolved.is_authenticated());
        assert_eq!(resolved.credentials, CredentialAction::Clear);
    }

    #[tokio::test]
    async fn test_rejected_access_token_clears() {
        let resolver = SessionResolver::new(provider());
        let resolved = resolver
            .resolve_at(creds(Some("forged"), None, Some(NOW + 3600)), NOW)
            .await;
        assert!(!resolved.is_authenticated());
        assert_eq!(resolved.credentials, CredentialAction::Clear);
    }

    #[tokio::test]
    async fn test_outage_fails_closed_and_keeps_cookies() {
        let provider = provider();
        provider.set_unavailable(true);
        let resolver = SessionResolver::new(provider.clone());

        let resolved = resolver
            .resolve_at(creds(Some("at-1"), Some("rt-1"), Some(NOW + 3600)), NOW)
            .await;
        assert!(!resolved.is_authenticated());
        assert_eq!(resolved.credentials, CredentialAction::Keep);
    }

    #[tokio::test]
    async fn test_refresh_outage_with_expired_token() {
        let provider = provider();
        provider.set_unavailable(true);
        let resolver = SessionResolver::new(provider.clone());

        let resolved = resolver
            .resolve_at(creds(Some("at-1"), Some("rt-1"), Some(NOW - 10)), NOW)
            .await;
        assert!(!resolved.is_authenticated());
        assert_eq!(resolved.credentials, CredentialAction::Keep);
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_attempted_once() {
        let provider = provider();
        let resolver = SessionResolver::new(provider.clone());
        resolver
            .resolve_at(creds(Some("at-1"), Some("rt-1"), Some(NOW)), NOW)
            .await;
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejected_access_token_falls_back_to_refresh() {
        // Expiry cookie says valid (clock skew) or is missing altogether
        for expires_at in [Some(NOW + 600), None] {
            let provider = provider();
            let resolver = SessionResolver::new(provider.clone());
            let resolved = resolver
                .resolve_at(creds(Some("at-old"), Some("rt-1"), expires_at), NOW)
                .await;

            assert!(resolved.is_authenticated(), "{:?}", expires_at);
            assert_eq!(
                resolved.credentials,
                CredentialAction::Emit(creds(Some("at-2"), Some("rt-2"), Some(NOW + 3600)))
            );
            assert_eq!(provider.refresh_calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_rejected_access_and_refresh_tokens_clear() {
        let provider = provider();
        let resolver = SessionResolver::new(provider.clone());
        let resolved = resolver
            .resolve_at(creds(Some("at-old"), Some("revoked"), Some(NOW + 600)), NOW)
            .await;

        assert!(!resolved.is_authenticated());
        assert_eq!(resolved.credentials, CredentialAction::Clear);
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_no_second_refresh_after_rejection() {
        // Near expiry: the refreshed token is rejected too
        let provider = Arc::new(StaticIdentityProvider::new().with_refresh(
            "rt-1",
            SessionTokens {
                access_token: "at-unknown".into(),
                refresh_token: "rt-2".into(),
                expires_at: NOW + 3600,
            },
        ));
        let resolver = SessionResolver::new(provider.clone());
        let resolved = resolver
            .resolve_at(creds(Some("at-1"), Some("rt-1"), Some(NOW + 5)), NOW)
            .await;

        assert!(!resolved.is_authenticated());
        assert_eq!(resolved.credentials, CredentialAction::Clear);
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_extreme_expiry_values() {
        let provider = provider();
        let resolver = SessionResolver::new(provider.clone());

        let resolved = resolver
            .resolve_at(creds(Some("at-1"), Some("rt-1"), Some(i64::MIN)), NOW)
            .await;
        assert!(resolved.is_authenticated());
        assert_eq!(provider.refresh_calls(), 1);

        let input = creds(Some("at-1"), Some("rt-1"), Some(i64::MAX));
        let resolved = resolver.resolve_at(input.clone(), NOW).await;
        assert_eq!(resolved.credentials, CredentialAction::Emit(input));
        assert_eq!(provider.refresh_calls(), 1);

        let resolved = resolver
            .resolve_at(creds(Some("at-1"), Some("rt-1"), Some(0)), i64::MIN)
            .await;
        assert!(resolved.is_authenticated());
    }

    #[tokio::test]
    async fn test_bearer_prefix_tolerated() {
        let resolver = SessionResolver::new(provider());
        let resolved = resolver
            .resolve_at(creds(Some("Bearer at-1"), None, None), NOW)
            .await;
        assert!(resolved.is_authenticated());
    }
}
