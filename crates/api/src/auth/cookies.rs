//! Session cookies
//!
//! The session travels in three HttpOnly cookies (access token, refresh token,
//! expiry). A fourth carries the PKCE code verifier between the sign-in page
//! and the callback.

use axum::http::{HeaderMap, HeaderValue, header};
use porter_auth::{CredentialAction, Credentials, SessionTokens};
use tracing::warn;

/// Access token cookie
pub const ACCESS_TOKEN_COOKIE: &str = "porter-access-token";

/// Refresh token cookie
pub const REFRESH_TOKEN_COOKIE: &str = "porter-refresh-token";

/// Access token expiry cookie (Unix seconds)
pub const EXPIRES_AT_COOKIE: &str = "porter-expires-at";

/// PKCE code verifier cookie
pub const CODE_VERIFIER_COOKIE: &str = "porter-code-verifier";

const SESSION_COOKIES: [&str; 3] = [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, EXPIRES_AT_COOKIE];

/// Maximum token size (8KB)
const MAX_TOKEN_SIZE: usize = 8 * 1024;

/// Maximum cookie header size (16KB)
const MAX_COOKIE_SIZE: usize = 16 * 1024;

/// Session cookies outlive the access token; the refresh token decides
const SESSION_MAX_AGE_SECS: i64 = 400 * 24 * 60 * 60;

/// Read one cookie from the request headers
///
/// Oversized headers and values are ignored, as if absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie_header in headers.get_all(header::COOKIE) {
        if cookie_header.len() > MAX_COOKIE_SIZE {
            continue;
        }
        let Ok(cookies) = cookie_header.to_str() else {
            continue;
        };

        for cookie in cookies.split(';') {
            let Some((key, value)) = cookie.trim().split_once('=') else {
                continue;
            };
            if key.trim() != name {
                continue;
            }

            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);

            if !value.is_empty() && value.len() <= MAX_TOKEN_SIZE {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Credential material carried by the request
pub fn credentials_from_headers(headers: &HeaderMap) -> Credentials {
    Credentials {
        access_token: read_cookie(headers, ACCESS_TOKEN_COOKIE),
        refresh_token: read_cookie(headers, REFRESH_TOKEN_COOKIE),
        expires_at: read_cookie(headers, EXPIRES_AT_COOKIE).and_then(|v| v.parse().ok()),
    }
}

/// Attributes shared by every cookie Porter writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    /// Add the `Secure` attribute
    pub secure: bool,
    /// Optional `Domain` attribute
    pub domain: Option<String>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secure: true,
            domain: None,
        }
    }
}

impl CookieSettings {
    fn build(&self, name: &str, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            name, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        cookie
    }

    /// Expire one cookie
    pub fn clear(&self, name: &str) -> String {
        self.build(name, "", 0)
    }

    /// `Set-Cookie` values for the given credentials
    pub fn session(&self, creds: &Credentials) -> Vec<String> {
        let mut cookies = Vec::with_capacity(SESSION_COOKIES.len());
        if let Some(token) = &creds.access_token {
            cookies.push(self.build(ACCESS_TOKEN_COOKIE, token, SESSION_MAX_AGE_SECS));
        }
        if let Some(token) = &creds.refresh_token {
            cookies.push(self.build(REFRESH_TOKEN_COOKIE, token, SESSION_MAX_AGE_SECS));
        }
        if let Some(expires_at) = creds.expires_at {
            cookies.push(self.build(
                EXPIRES_AT_COOKIE,
                &expires_at.to_string(),
                SESSION_MAX_AGE_SECS,
            ));
        }
        cookies
    }

    /// `Set-Cookie` values for a freshly issued session
    pub fn new_session(&self, tokens: &SessionTokens) -> Vec<String> {
        self.session(&Credentials::from(tokens.clone()))
    }

    /// Expire all session cookies
    pub fn clear_session(&self) -> Vec<String> {
        SESSION_COOKIES.iter().map(|name| self.clear(name)).collect()
    }

    /// `Set-Cookie` values implementing a resolver decision
    pub fn for_action(&self, action: &CredentialAction) -> Vec<String> {
        match action {
            CredentialAction::Emit(creds) => self.session(creds),
            CredentialAction::Clear => self.clear_session(),
            CredentialAction::Keep => Vec::new(),
        }
    }
}

fn cookie_name(set_cookie: &str) -> &str {
    set_cookie
        .split_once('=')
        .map(|(name, _)| name.trim())
        .unwrap_or_default()
}

/// Append `Set-Cookie` headers, leaving cookies the handler already set alone
pub fn append_cookies(headers: &mut HeaderMap, cookies: Vec<String>) {
    let already_set: Vec<String> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| cookie_name(v).to_string())
        .collect();

    for cookie in cookies {
        if already_set.iter().any(|name| name == cookie_name(&cookie)) {
            continue;
        }
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(_) => warn!(cookie = cookie_name(&cookie), "cookie value not representable"),
        }
    }
}
