//! Gate path configuration
//!
//! Every path the access gate knows. Defaults match the stock page layout;
//! only override what differs.

use serde::Deserialize;

/// Gate paths
///
/// ```toml
/// [gate]
/// sign_in = "/login"
/// protected_prefixes = ["/dashboard", "/protected", "/role-selection"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Sign-in page
    pub sign_in: String,
    /// Sign-up page
    pub sign_up: String,
    /// Forgot-password page
    pub forgot_password: String,
    /// Canonical dashboard
    pub dashboard: String,
    /// Role-selection page
    pub role_selection: String,
    /// Worker-profile creation page, reachable without a selected role
    pub create_worker_profile: String,
    /// Landing page
    pub landing: String,
    /// Protected namespace prefixes
    pub protected_prefixes: Vec<String>,
    /// Old paths redirected to the dashboard
    pub legacy_aliases: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            sign_in: "/sign-in".into(),
            sign_up: "/sign-up".into(),
            forgot_password: "/forgot-password".into(),
            dashboard: "/dashboard".into(),
            role_selection: "/role-selection".into(),
            create_worker_profile: "/dashboard/create-worker-profile".into(),
            landing: "/".into(),
            protected_prefixes: vec![
                "/dashboard".into(),
                "/protected".into(),
                "/role-selection".into(),
            ],
            legacy_aliases: vec!["/protected".into()],
        }
    }
}

impl GateConfig {
    /// Named single paths, for validation
    pub fn named_paths(&self) -> [(&'static str, &str); 7] {
        [
            ("sign_in", self.sign_in.as_str()),
            ("sign_up", self.sign_up.as_str()),
            ("forgot_password", self.forgot_password.as_str()),
            ("dashboard", self.dashboard.as_str()),
            ("role_selection", self.role_selection.as_str()),
            ("create_worker_profile", self.create_worker_profile.as_str()),
            ("landing", self.landing.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        let config: GateConfig = toml::from_str(r#"sign_in = "/login""#).unwrap();
        assert_eq!(config.sign_in, "/login");
        assert_eq!(config.dashboard, "/dashboard");
        assert_eq!(config.protected_prefixes.len(), 3);
    }

    #[test]
    fn test_named_paths() {
        let config = GateConfig::default();
        let names: Vec<_> = config.named_paths().iter().map(|(n, _)| *n).collect();
        assert!(names.contains(&"create_worker_profile"));
        assert!(config.named_paths().iter().all(|(_, p)| p.starts_with('/')));
    }
}
