//! Configuration validation
//!
//! Checks that fail fast at startup:
//! - identity provider URL present and http(s)
//! - JWT secret long enough when set
//! - bounded profile wait
//! - non-zero port
//! - absolute gate paths

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::identity::{MAX_PROFILE_WAIT, MIN_JWT_SECRET_LEN};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server(config)?;
    validate_identity(config)?;
    validate_gate(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        return Err(ConfigError::invalid_value("server", "port", "must not be 0"));
    }
    if config.server.request_timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "server",
            "request_timeout",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_identity(config: &Config) -> Result<()> {
    let identity = &config.identity;

    let base_url = identity.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::missing_field("identity", "base_url"));
    }
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::invalid_value(
            "identity",
            "base_url",
            format!("'{}' must start with http:// or https://", base_url),
        ));
    }

    if let Some(secret) = &identity.jwt_secret
        && secret.len() < MIN_JWT_SECRET_LEN
    {
        return Err(ConfigError::invalid_value(
            "identity",
            "jwt_secret",
            format!("must be at least {} characters", MIN_JWT_SECRET_LEN),
        ));
    }

    if identity.profile_wait > MAX_PROFILE_WAIT {
        return Err(ConfigError::invalid_value(
            "identity",
            "profile_wait",
            format!("must be at most {}s", MAX_PROFILE_WAIT.as_secs()),
        ));
    }

    if identity.request_timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "identity",
            "request_timeout",
            "must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_gate(config: &Config) -> Result<()> {
    let gate = &config.gate;

    for (field, path) in gate.named_paths() {
        if !path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "gate",
                field,
                format!("'{}' must start with '/'", path),
            ));
        }
    }

    for (field, list) in [
        ("protected_prefixes", &gate.protected_prefixes),
        ("legacy_aliases", &gate.legacy_aliases),
    ] {
        if let Some(bad) = list.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::invalid_value(
                "gate",
                field,
                format!("'{}' must start with '/'", bad),
            ));
        }
    }

    Ok(())
}
