//! Config check command
//!
//! Loads and validates the configuration, then prints what `serve` would use.

use std::path::Path;

use anyhow::{Context, Result};
use porter_config::Config;

use super::gate_paths;

/// Validate the config file and print a summary
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::from_file(config_path)
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;

    println!("{}", summary(&config, config_path));
    Ok(())
}

fn summary(config: &Config, config_path: &Path) -> String {
    let identity = &config.identity;
    let server = &config.server;
    let paths = gate_paths(&config.gate);

    let verification = if identity.verifies_locally() {
        "local (HS256 secret)"
    } else {
        "provider round trip"
    };

    let mut lines = vec![
        format!("Configuration OK: {}", config_path.display()),
        String::new(),
        "Server".to_string(),
        format!("  listen           {}", server.bind_address()),
        format!(
            "  request timeout  {}",
            humanize(server.request_timeout.as_millis())
        ),
        format!("  audit logging    {}", server.audit_logging),
        format!(
            "  pages            {}",
            server
                .pages_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        ),
        format!(
            "  cookies          secure={} domain={}",
            server.cookie_secure,
            server.cookie_domain.as_deref().unwrap_or("(host-only)")
        ),
        String::new(),
        "Identity".to_string(),
        format!("  base url         {}", identity.base_url),
        format!("  verification     {}", verification),
        format!(
            "  refresh margin   {}",
            humanize(identity.refresh_margin.as_millis())
        ),
        format!(
            "  profile wait     {}",
            humanize(identity.profile_wait.as_millis())
        ),
        String::new(),
        "Store".to_string(),
        format!("  database         {}", config.store.db_path().display()),
        String::new(),
        "Gate".to_string(),
        format!("  sign-in          {}", paths.sign_in),
        format!("  dashboard        {}", paths.dashboard),
        format!("  role selection   {}", paths.role_selection),
        format!("  worker profile   {}", paths.create_worker_profile),
        format!("  protected        {}", paths.protected_prefixes.join(", ")),
        format!("  legacy aliases   {}", paths.legacy_aliases.join(", ")),
    ];
    lines.push(String::new());
    lines.join("\n")
}

fn humanize(millis: u128) -> String {
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}
