//! Session handling at the HTTP boundary
//!
//! - `cookies` reads and writes the session cookies
//! - `middleware` is the gate: session resolution plus the access decision
//! - `extractors` hand the gate's identity to handlers
//!
//! # Usage
//!
//! ```ignore
//! use porter_api::auth::{AuthIdentity, OptionalIdentity};
//!
//! // Any caller; identity present when signed in
//! async fn landing(OptionalIdentity(identity): OptionalIdentity) -> impl IntoResponse { }
//!
//! // Signed-in callers only, 401 otherwise
//! async fn profile(identity: AuthIdentity) -> impl IntoResponse { }
//! ```

pub mod cookies;
pub mod extractors;
pub mod middleware;

pub use cookies::{
    ACCESS_TOKEN_COOKIE, CODE_VERIFIER_COOKIE, CookieSettings, EXPIRES_AT_COOKIE,
    REFRESH_TOKEN_COOKIE, append_cookies, credentials_from_headers, read_cookie,
};
pub use extractors::{AuthIdentity, OptionalIdentity};
pub use middleware::{gate, role_state};
