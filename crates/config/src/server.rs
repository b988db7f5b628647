//! HTTP server configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// HTTP server configuration
///
/// # Example
///
/// ```toml
/// [server]
/// host = "0.0.0.0"             # default
/// port = 3000                  # default
/// request_timeout = "30s"      # default
/// audit_logging = false        # default
/// pages_dir = "./public"       # optional static pages behind the gate
/// cookie_secure = true         # default
/// cookie_domain = "example.com"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Upper bound for a single request, gate and handler included
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Wrap every request in an `audit` span and warn on 4xx/5xx
    pub audit_logging: bool,

    /// Directory of pre-rendered pages served behind the gate
    ///
    /// Without it, anything that passes the gate and is not an API route
    /// answers 404.
    pub pages_dir: Option<PathBuf>,

    /// Mark session cookies `Secure`
    ///
    /// Turn off only for plain-HTTP local development.
    pub cookie_secure: bool,

    /// `Domain` attribute for session cookies (host-only when unset)
    pub cookie_domain: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout: Duration::from_secs(30),
            audit_logging: false,
            pages_dir: None,
            cookie_secure: true,
            cookie_domain: None,
        }
    }
}

impl ServerConfig {
    /// `host:port` to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.cookie_secure);
        assert!(!config.audit_logging);
        assert!(config.pages_dir.is_none());
    }

    #[test]
    fn test_local_development() {
        let toml = r#"
host = "127.0.0.1"
port = 8080
request_timeout = "5s"
cookie_secure = false
pages_dir = "./public"
"#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(!config.cookie_secure);
        assert_eq!(config.pages_dir, Some(PathBuf::from("./public")));
    }
}
