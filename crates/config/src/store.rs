//! Profile store configuration

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Profile store configuration
///
/// ```toml
/// [store]
/// db_path = "~/.porter/porter.db"   # default
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path; `~/` is expanded
    pub db_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Database path with `~` expanded
    pub fn db_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => expand_tilde(path),
            None => dirs::home_dir()
                .map(|h| h.join(".porter").join("porter.db"))
                .unwrap_or_else(|| PathBuf::from("./data/porter.db")),
        }
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    path.to_str()
        .and_then(|s| s.strip_prefix("~/"))
        .and_then(|stripped| dirs::home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path() {
        let path = StoreConfig::default().db_path();
        assert!(path.ends_with("porter.db"));
    }

    #[test]
    fn test_explicit_path() {
        let config: StoreConfig = toml::from_str(r#"db_path = "/var/lib/porter/porter.db""#).unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/porter/porter.db"));
    }

    #[test]
    fn test_tilde_expanded() {
        let config: StoreConfig = toml::from_str(r#"db_path = "~/porter/db.sqlite""#).unwrap();
        let path = config.db_path();
        if dirs::home_dir().is_some() {
            assert!(!path.to_string_lossy().starts_with('~'));
        }
        assert!(path.ends_with("porter/db.sqlite"));
    }
}
