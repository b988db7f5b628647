//! Command implementations for the Porter CLI

pub mod check;
pub mod serve;

use porter_auth::GatePaths;
use porter_config::GateConfig;

/// Gate paths from the `[gate]` section
pub fn gate_paths(gate: &GateConfig) -> GatePaths {
    GatePaths {
        sign_in: gate.sign_in.clone(),
        sign_up: gate.sign_up.clone(),
        forgot_password: gate.forgot_password.clone(),
        dashboard: gate.dashboard.clone(),
        role_selection: gate.role_selection.clone(),
        create_worker_profile: gate.create_worker_profile.clone(),
        landing: gate.landing.clone(),
        protected_prefixes: gate.protected_prefixes.clone(),
        legacy_aliases: gate.legacy_aliases.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gate_config_matches_default_paths() {
        assert_eq!(gate_paths(&GateConfig::default()), GatePaths::default());
    }

    #[test]
    fn test_overrides_carried_over() {
        let gate = GateConfig {
            sign_in: "/login".into(),
            legacy_aliases: vec!["/protected".into(), "/app".into()],
            ..Default::default()
        };
        let paths = gate_paths(&gate);
        assert_eq!(paths.sign_in, "/login");
        assert_eq!(paths.legacy_aliases.len(), 2);
        assert_eq!(paths.dashboard, "/dashboard");
    }
}
