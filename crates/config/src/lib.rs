//! Porter Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Only the identity provider URL is required; everything else has a default.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use porter_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[identity]\nbase_url = \"https://id.example.com\"").unwrap();
//! assert_eq!(config.server.port, 3000);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "json"
//!
//! [server]
//! port = 3000
//! pages_dir = "./public"
//!
//! [identity]
//! base_url = "https://id.example.com"
//! api_key = "public-anon-key"
//!
//! [store]
//! db_path = "/var/lib/porter/porter.db"
//! ```

mod error;
mod gate;
mod identity;
mod logging;
mod server;
mod store;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use gate::GateConfig;
pub use identity::{IdentityConfig, MAX_PROFILE_WAIT, MIN_JWT_SECRET_LEN};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use server::ServerConfig;
pub use store::StoreConfig;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// HTTP server
    pub server: ServerConfig,

    /// External identity provider
    pub identity: IdentityConfig,

    /// Profile store
    pub store: StoreConfig,

    /// Gate paths
    pub gate: GateConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_minimal_config() {
        let config = Config::from_str("[identity]\nbase_url = \"http://localhost:9999\"").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.gate.sign_in, "/sign-in");
        assert_eq!(config.identity.refresh_margin, Duration::from_secs(60));
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[log]
level = "debug"
format = "json"
output = "stderr"

[server]
host = "127.0.0.1"
port = 8080
request_timeout = "15s"
audit_logging = true
pages_dir = "./public"
cookie_secure = false
cookie_domain = "example.com"

[identity]
base_url = "https://id.example.com"
api_key = "anon"
jwt_secret = "0123456789abcdef0123456789abcdef"
refresh_margin = "90s"
request_timeout = "3s"
profile_wait = "500ms"

[store]
db_path = "/tmp/porter.db"

[gate]
sign_in = "/login"
legacy_aliases = ["/protected", "/app"]
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.server.port, 8080);
        assert!(config.server.audit_logging);
        assert_eq!(config.server.cookie_domain.as_deref(), Some("example.com"));
        assert!(config.identity.verifies_locally());
        assert_eq!(config.identity.profile_wait, Duration::from_millis(500));
        assert_eq!(config.store.db_path(), std::path::PathBuf::from("/tmp/porter.db"));
        assert_eq!(config.gate.sign_in, "/login");
        assert_eq!(config.gate.legacy_aliases.len(), 2);
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_unknown_file() {
        let result = Config::from_file("/nonexistent/porter.toml");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }
}
