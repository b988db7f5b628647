//! Identity provider configuration
//!
//! Points Porter at the external identity backend (GoTrue-compatible).

use std::time::Duration;

use serde::Deserialize;

/// Minimum length of the provider's JWT secret
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Longest allowed bootstrap wait for an externally created profile
pub const MAX_PROFILE_WAIT: Duration = Duration::from_secs(5);

/// Identity provider configuration
///
/// # Example
///
/// ```toml
/// [identity]
/// base_url = "https://id.example.com"
/// api_key = "public-anon-key"
/// jwt_secret = "shared-secret-at-least-32-characters"  # optional, enables local verification
/// refresh_margin = "60s"
/// request_timeout = "10s"
/// profile_wait = "1s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Provider base URL (required)
    pub base_url: String,

    /// Public API key sent as the `apikey` header
    pub api_key: String,

    /// Provider signing secret; when set, access tokens are verified locally
    pub jwt_secret: Option<String>,

    /// Refresh credentials this long before they expire
    #[serde(with = "humantime_serde")]
    pub refresh_margin: Duration,

    /// Timeout for each provider call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Single wait for a provider-created profile during bootstrap (0s disables)
    #[serde(with = "humantime_serde")]
    pub profile_wait: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            jwt_secret: None,
            refresh_margin: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            profile_wait: Duration::from_secs(1),
        }
    }
}

impl IdentityConfig {
    /// Whether access tokens are verified without a provider round trip
    pub fn verifies_locally(&self) -> bool {
        self.jwt_secret.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IdentityConfig::default();
        assert!(config.base_url.is_empty());
        assert_eq!(config.refresh_margin, Duration::from_secs(60));
        assert_eq!(config.profile_wait, Duration::from_secs(1));
        assert!(!config.verifies_locally());
    }

    #[test]
    fn test_durations() {
        let toml = r#"
base_url = "https://id.example.com"
refresh_margin = "2m"
profile_wait = "0s"
request_timeout = "1500ms"
"#;
        let config: IdentityConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.refresh_margin, Duration::from_secs(120));
        assert!(config.profile_wait.is_zero());
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_bad_duration() {
        let result: std::result::Result<IdentityConfig, _> =
            toml::from_str(r#"profile_wait = "soon""#);
        assert!(result.is_err());
    }
}
