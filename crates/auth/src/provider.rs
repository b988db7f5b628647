//! Identity providers
//!
//! Defines the `IdentityProvider` trait: the three questions Porter asks the
//! external identity backend (who is this token, exchange this code, refresh
//! this session). `HttpIdentityProvider` speaks the GoTrue-compatible REST
//! API; tests use `test_utils::StaticIdentityProvider`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::claims::AccessTokenClaims;
use crate::error::{AuthError, Result};
use crate::identity::{Identity, ProviderUser};
use crate::session::SessionTokens;

/// Access token lifetime assumed when the provider reports none
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// External identity backend
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the identity behind an access token
    ///
    /// # Errors
    ///
    /// Credential errors (`TokenExpired`, `InvalidSignature`,
    /// `CredentialRejected`, ...) when the token is bad;
    /// `UpstreamUnavailable` when the provider cannot answer.
    async fn identity(&self, access_token: &str) -> Result<Identity>;

    /// Exchange an authorization code for a session
    async fn exchange_code(&self, code: &str, code_verifier: Option<&str>)
    -> Result<SessionTokens>;

    /// Trade a refresh token for a fresh session
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens>;

    /// Provider name for logging/debugging
    fn name(&self) -> &'static str;
}

/// Local HS256 verification of the provider's access tokens
///
/// Lets the resolver skip the `GET /user` round trip when the provider's
/// JWT secret is configured.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithm", &"HS256")
            .finish()
    }
}

impl JwtVerifier {
    /// Create a verifier for the given shared secret
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // Provider tokens carry `aud: authenticated`; it adds nothing here
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.required_spec_claims.insert("exp".to_string());

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims> {
        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("JWT validation failed: {:?}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                    jsonwebtoken::errors::ErrorKind::InvalidToken
                    | jsonwebtoken::errors::ErrorKind::Base64(_) => AuthError::InvalidTokenFormat,
                    _ => AuthError::InvalidClaims(e.to_string()),
                }
            })?;
        Ok(data.claims)
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
}

impl TokenResponse {
    fn into_tokens(self, now: i64) -> SessionTokens {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now + self.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS));
        SessionTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Error body as returned by the provider (field names vary by endpoint)
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ProviderErrorBody {
    fn message(&self, status: StatusCode) -> String {
        self.error_description
            .as_ref()
            .or(self.msg.as_ref())
            .or(self.error_code.as_ref())
            .or(self.error.as_ref())
            .cloned()
            .unwrap_or_else(|| status.to_string())
    }

    /// Body says the session or refresh token itself is dead
    fn names_dead_session(&self) -> bool {
        self.error.as_deref() == Some("invalid_grant")
            || self
                .error_code
                .as_deref()
                .is_some_and(|code| DEAD_SESSION_CODES.contains(&code))
    }
}

/// Provider error codes for a session that can no longer be used
const DEAD_SESSION_CODES: &[&str] = &[
    "bad_jwt",
    "refresh_token_not_found",
    "refresh_token_already_used",
    "session_not_found",
    "session_expired",
    "user_not_found",
    "user_banned",
];

/// Provider endpoint a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    User,
    Exchange,
    Refresh,
}

/// Map a non-success provider response to an error
///
/// Only 401/403 and an explicit dead-session body reject a credential.
/// Timeouts, rate limits, 5xx and anything unexpected are upstream
/// failures, so the caller keeps its cookies.
fn classify(endpoint: Endpoint, status: StatusCode, body: &ProviderErrorBody) -> AuthError {
    let message = body.message(status);
    if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS
        )
    {
        return AuthError::upstream(message);
    }

    let rejected = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || (status.is_client_error() && body.names_dead_session());

    match endpoint {
        Endpoint::User | Endpoint::Refresh if rejected => AuthError::CredentialRejected(message),
        Endpoint::Exchange if status.is_client_error() => AuthError::CodeExchangeFailed(message),
        _ => AuthError::upstream(format!("unexpected {} from provider: {}", status, message)),
    }
}

/// GoTrue-compatible HTTP identity provider
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    verifier: Option<JwtVerifier>,
}

impl std::fmt::Debug for HttpIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIdentityProvider")
            .field("base_url", &self.base_url)
            .field("local_verification", &self.verifier.is_some())
            .finish()
    }
}

impl HttpIdentityProvider {
    /// Create a provider for `base_url` (e.g. `https://id.example.com`)
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::upstream(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            verifier: None,
        })
    }

    /// Verify access tokens locally with the provider's JWT secret
    #[must_use]
    pub fn with_jwt_secret(mut self, secret: &[u8]) -> Self {
        self.verifier = Some(JwtVerifier::new(secret));
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    async fn token_request(
        &self,
        endpoint: Endpoint,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<SessionTokens> {
        let response = self
            .client
            .post(self.url("/token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            return Err(classify(endpoint, status, &body));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::upstream(format!("malformed token response: {}", e)))?;
        Ok(tokens.into_tokens(Utc::now().timestamp()))
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn identity(&self, access_token: &str) -> Result<Identity> {
        if let Some(verifier) = &self.verifier {
            let claims = verifier.verify(access_token)?;
            return Ok(Identity::from_claims(&claims));
        }

        let response = self
            .client
            .get(self.url("/user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            return Err(classify(Endpoint::User, status, &body));
        }

        let user: ProviderUser = response
            .json()
            .await
            .map_err(|e| AuthError::upstream(format!("malformed user response: {}", e)))?;
        Ok(Identity::from_provider_user(&user))
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<SessionTokens> {
        let body = serde_json::json!({
            "auth_code": code,
            "code_verifier": code_verifier,
        });

        self.token_request(Endpoint::Exchange, "pkce", body).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens> {
        let body = serde_json::json!({ "refresh_token": refresh_token });

        self.token_request(Endpoint::Refresh, "refresh_token", body).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::session::{CredentialAction, Credentials, SessionResolver};
    use crate::test_utils::{
        TEST_SECRET, create_expired_test_token, create_test_token, create_test_token_with_secret,
    };

    #[test]
    fn test_verifier_valid_token() {
        let verifier = JwtVerifier::new(TEST_SECRET);
        let token = create_test_token("user-1", "test@example.com", Some("Ada"));

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.subject, "user-1");
        assert_eq!(claims.metadata_str("full_name"), Some("Ada"));
    }

    #[test]
    fn test_verifier_invalid_signature() {
        let verifier = JwtVerifier::new(TEST_SECRET);
        let token = create_test_token_with_secret(
            "user-1",
            "test@example.com",
            b"different-secret-key-32-bytes!!!",
        );

        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verifier_expired() {
        let verifier = JwtVerifier::new(TEST_SECRET);
        let token = create_expired_test_token("user-1", "test@example.com");

        assert!(matches!(verifier.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_verifier_garbage() {
        let verifier = JwtVerifier::new(TEST_SECRET);
        let err = verifier.verify("not-a-jwt").unwrap_err();
        assert!(err.is_credential_rejection());
    }

    #[tokio::test]
    async fn test_http_provider_local_verification() {
        let provider = HttpIdentityProvider::new(
            "http://127.0.0.1:9/",
            "anon-key",
            Duration::from_millis(200),
        )
        .unwrap()
        .with_jwt_secret(TEST_SECRET);

        let token = create_test_token("user-7", "seven@example.com", None);
        let identity = provider.identity(&token).await.unwrap();
        assert_eq!(identity.id, "user-7");
        assert_eq!(identity.email, "seven@example.com");
    }

    #[tokio::test]
    async fn test_http_provider_unreachable_is_upstream() {
        // Port 9 (discard) is not expected to be listening
        let provider =
            HttpIdentityProvider::new("http://127.0.0.1:9", "anon-key", Duration::from_millis(200))
                .unwrap();

        let err = provider.refresh("rt").await.unwrap_err();
        assert!(err.is_upstream());

        let err = provider.identity("at").await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn test_token_response_expiry() {
        let with_expires_in = TokenResponse {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: Some(120),
            expires_at: None,
        };
        assert_eq!(with_expires_in.into_tokens(1_000).expires_at, 1_120);

        let with_expires_at = TokenResponse {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: Some(120),
            expires_at: Some(5_000),
        };
        assert_eq!(with_expires_at.into_tokens(1_000).expires_at, 5_000);
    }

    #[test]
    fn test_error_body_message_precedence() {
        let body: ProviderErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token: Already Used"}"#,
        )
        .unwrap();
        assert_eq!(
            body.message(StatusCode::BAD_REQUEST),
            "Invalid Refresh Token: Already Used"
        );

        let empty = ProviderErrorBody::default();
        assert_eq!(empty.message(StatusCode::BAD_REQUEST), "400 Bad Request");
    }

    fn body(json: &str) -> ProviderErrorBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_classify_exchange() {
        let empty = ProviderErrorBody::default();
        assert!(classify(Endpoint::Exchange, StatusCode::BAD_GATEWAY, &empty).is_upstream());

        let err = classify(
            Endpoint::Exchange,
            StatusCode::BAD_REQUEST,
            &body(r#"{"msg":"flow state expired"}"#),
        );
        assert!(matches!(err, AuthError::CodeExchangeFailed(m) if m == "flow state expired"));

        let err = classify(Endpoint::Exchange, StatusCode::TOO_MANY_REQUESTS, &empty);
        assert!(err.is_upstream());
    }

    #[test]
    fn test_classify_only_auth_failures_reject_credentials() {
        let empty = ProviderErrorBody::default();
        for endpoint in [Endpoint::User, Endpoint::Refresh] {
            for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
                let err = classify(endpoint, status, &empty);
                assert!(err.is_credential_rejection(), "{:?} {}", endpoint, status);
            }
            for status in [
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::REQUEST_TIMEOUT,
                StatusCode::NOT_FOUND,
                StatusCode::BAD_REQUEST,
                StatusCode::SERVICE_UNAVAILABLE,
            ] {
                let err = classify(endpoint, status, &empty);
                assert!(err.is_upstream(), "{:?} {}", endpoint, status);
            }
        }
    }

    #[test]
    fn test_classify_dead_refresh_token() {
        let err = classify(
            Endpoint::Refresh,
            StatusCode::BAD_REQUEST,
            &body(r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token: Already Used"}"#),
        );
        assert!(err.is_credential_rejection());

        let err = classify(
            Endpoint::Refresh,
            StatusCode::BAD_REQUEST,
            &body(r#"{"code":400,"error_code":"refresh_token_not_found","msg":"Invalid Refresh Token"}"#),
        );
        assert!(matches!(err, AuthError::CredentialRejected(m) if m == "Invalid Refresh Token"));

        // Rate limits stay transient even with a dead-session code
        let err = classify(
            Endpoint::Refresh,
            StatusCode::TOO_MANY_REQUESTS,
            &body(r#"{"error_code":"session_expired"}"#),
        );
        assert!(err.is_upstream());
    }

    /// Serve one canned HTTP response per connection
    async fn canned_server(status_line: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}",
                    status_line
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_provider_rate_limit_keeps_session() {
        let base = canned_server("429 Too Many Requests").await;
        let provider = Arc::new(
            HttpIdentityProvider::new(base, "anon-key", Duration::from_secs(2)).unwrap(),
        );

        assert!(provider.identity("at").await.unwrap_err().is_upstream());
        assert!(provider.refresh("rt").await.unwrap_err().is_upstream());

        let resolver = SessionResolver::new(provider);
        let resolved = resolver
            .resolve_at(
                Credentials {
                    access_token: Some("at".into()),
                    refresh_token: Some("rt".into()),
                    expires_at: Some(i64::MAX),
                },
                1_900_000_000,
            )
            .await;
        assert!(!resolved.is_authenticated());
        assert_eq!(resolved.credentials, CredentialAction::Keep);
    }

    #[tokio::test]
    async fn test_http_provider_unauthorized_rejects() {
        let base = canned_server("401 Unauthorized").await;
        let provider =
            HttpIdentityProvider::new(base, "anon-key", Duration::from_secs(2)).unwrap();

        let err = provider.identity("at").await.unwrap_err();
        assert!(err.is_credential_rejection());
    }
}
