//! Test utilities
//!
//! `StaticIdentityProvider` is an in-process identity backend with a switch
//! for simulating outages. The JWT helpers mint real HS256 tokens so tests
//! exercise the actual verification path rather than a mock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use crate::claims::AccessTokenClaims;
use crate::error::{AuthError, Result};
use crate::identity::Identity;
use crate::profile::{
    CustomerProfile, EnsureRow, Ensured, NewProfile, Profile, RoleAssignment, WorkerProfile,
};
use crate::provider::IdentityProvider;
use crate::roles::RoleName;
use crate::session::SessionTokens;
use crate::store::ProfileStore;

/// Test secret for JWT signing (32 bytes for HS256)
pub const TEST_SECRET: &[u8] = b"test-secret-key-32-bytes-long!!!";

/// Identity provider backed by fixed tables
///
/// Unknown tokens and codes are rejected the way a real provider would.
/// `set_unavailable(true)` makes every call fail with `UpstreamUnavailable`.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    users: HashMap<String, Identity>,
    codes: HashMap<String, SessionTokens>,
    refreshes: HashMap<String, SessionTokens>,
    unavailable: AtomicBool,
    refresh_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
}

impl StaticIdentityProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `access_token` as `identity`
    #[must_use]
    pub fn with_user(mut self, access_token: &str, identity: Identity) -> Self {
        self.users.insert(access_token.to_string(), identity);
        self
    }

    /// Accept `code` and issue `tokens` for it
    #[must_use]
    pub fn with_code(mut self, code: &str, tokens: SessionTokens) -> Self {
        self.codes.insert(code.to_string(), tokens);
        self
    }

    /// Accept `refresh_token` and issue `tokens` for it
    #[must_use]
    pub fn with_refresh(mut self, refresh_token: &str, tokens: SessionTokens) -> Self {
        self.refreshes.insert(refresh_token.to_string(), tokens);
        self
    }

    /// Register a user reachable through both an access token and a code
    ///
    /// The code exchanges to `at-<id>` / `rt-<id>`, valid for an hour.
    #[must_use]
    pub fn with_sign_in(self, code: &str, identity: Identity) -> Self {
        let tokens = session_for(&identity.id);
        let access = tokens.access_token.clone();
        self.with_code(code, tokens).with_user(&access, identity)
    }

    /// Simulate a provider outage
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of refresh attempts seen
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of code exchanges seen
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::upstream("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn identity(&self, access_token: &str) -> Result<Identity> {
        self.check_available()?;
        self.users
            .get(access_token)
            .cloned()
            .ok_or_else(|| AuthError::CredentialRejected("invalid JWT".into()))
    }

    async fn exchange_code(
        &self,
        code: &str,
        _code_verifier: Option<&str>,
    ) -> Result<SessionTokens> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.codes
            .get(code)
            .cloned()
            .ok_or_else(|| AuthError::CodeExchangeFailed("invalid flow state, no valid flow state found".into()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.refreshes
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| AuthError::CredentialRejected("Invalid Refresh Token".into()))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Profile store wrapper that can be switched into failing every call
pub struct FaultyProfileStore {
    inner: Arc<dyn ProfileStore>,
    failing: AtomicBool,
}

impl FaultyProfileStore {
    /// Wrap a working store
    pub fn new(inner: Arc<dyn ProfileStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    /// Make every call fail with a database error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::database("database is locked"));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FaultyProfileStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        self.check()?;
        self.inner.get_profile(user_id).await
    }

    async fn upsert_profile(&self, profile: &NewProfile) -> Result<()> {
        self.check()?;
        self.inner.upsert_profile(profile).await
    }

    async fn set_selected_role(&self, profile: &NewProfile, role: RoleName) -> Result<()> {
        self.check()?;
        self.inner.set_selected_role(profile, role).await
    }

    async fn role_in_catalog(&self, role: RoleName) -> Result<bool> {
        self.check()?;
        self.inner.role_in_catalog(role).await
    }

    async fn get_role_assignment(
        &self,
        user_id: &str,
        role: RoleName,
    ) -> Result<Option<RoleAssignment>> {
        self.check()?;
        self.inner.get_role_assignment(user_id, role).await
    }

    async fn list_role_assignments(&self, user_id: &str) -> Result<Vec<RoleAssignment>> {
        self.check()?;
        self.inner.list_role_assignments(user_id).await
    }

    async fn ensure_exists(&self, row: &EnsureRow) -> Result<Ensured> {
        self.check()?;
        self.inner.ensure_exists(row).await
    }

    async fn get_worker_profile(&self, user_id: &str) -> Result<Option<WorkerProfile>> {
        self.check()?;
        self.inner.get_worker_profile(user_id).await
    }

    async fn get_customer_profile(&self, user_id: &str) -> Result<Option<CustomerProfile>> {
        self.check()?;
        self.inner.get_customer_profile(user_id).await
    }
}

/// Session tokens `at-<id>` / `rt-<id>` expiring an hour from now
pub fn session_for(user_id: &str) -> SessionTokens {
    SessionTokens {
        access_token: format!("at-{}", user_id),
        refresh_token: format!("rt-{}", user_id),
        expires_at: (Utc::now() + Duration::hours(1)).timestamp(),
    }
}

/// Create a signed access token valid for an hour
pub fn create_test_token(user_id: &str, email: &str, full_name: Option<&str>) -> String {
    create_test_token_with_options(user_id, email, full_name, TEST_SECRET, Duration::hours(1))
}

/// Create a token signed with a different secret
pub fn create_test_token_with_secret(user_id: &str, email: &str, secret: &[u8]) -> String {
    create_test_token_with_options(user_id, email, None, secret, Duration::hours(1))
}

/// Create a token that expired an hour ago
pub fn create_expired_test_token(user_id: &str, email: &str) -> String {
    create_test_token_with_options(user_id, email, None, TEST_SECRET, Duration::hours(-1))
}

/// Create a token with full control over all options
pub fn create_test_token_with_options(
    user_id: &str,
    email: &str,
    full_name: Option<&str>,
    secret: &[u8],
    expires_in: Duration,
) -> String {
    let now = Utc::now();

    let mut user_metadata = HashMap::new();
    if let Some(name) = full_name {
        user_metadata.insert("full_name".to_string(), serde_json::json!(name));
    }

    let claims = AccessTokenClaims {
        subject: user_id.to_string(),
        email: email.to_string(),
        role: Some("authenticated".to_string()),
        user_metadata,
        session_id: Some(format!("test-session-{}", user_id)),
        expires_at: (now + expires_in).timestamp(),
        issued_at: now.timestamp(),
        issuer: None,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .expect("failed to encode test JWT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_sign_in() {
        let provider =
            StaticIdentityProvider::new().with_sign_in("abc123", Identity::new("u1", "a@b.c"));

        let tokens = provider.exchange_code("abc123", None).await.unwrap();
        assert_eq!(tokens.access_token, "at-u1");
        let identity = provider.identity(&tokens.access_token).await.unwrap();
        assert_eq!(identity.id, "u1");
        assert_eq!(provider.exchange_calls(), 1);
    }

    #[tokio::test]
    async fn test_static_provider_rejects_unknown() {
        let provider = StaticIdentityProvider::new();
        assert!(matches!(
            provider.exchange_code("nope", None).await,
            Err(AuthError::CodeExchangeFailed(_))
        ));
        assert!(
            provider
                .identity("nope")
                .await
                .unwrap_err()
                .is_credential_rejection()
        );
    }

    #[tokio::test]
    async fn test_static_provider_outage() {
        let provider =
            StaticIdentityProvider::new().with_user("at", Identity::new("u1", "a@b.c"));
        provider.set_unavailable(true);
        assert!(provider.identity("at").await.unwrap_err().is_upstream());

        provider.set_unavailable(false);
        assert!(provider.identity("at").await.is_ok());
    }

    #[test]
    fn test_token_format() {
        let token = create_test_token("user-1", "test@example.com", None);
        assert_eq!(token.split('.').count(), 3);
    }
}
