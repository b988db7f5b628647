//! Server startup
//!
//! Wires the identity provider client, the profile store and the router, then
//! serves until Ctrl-C or SIGTERM.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use porter_api::{AppState, CookieSettings, RouterOptions, StateOptions, build_router_with_options};
use porter_auth::{HttpIdentityProvider, SqliteProfileStore};
use porter_config::{Config, IdentityConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::gate_paths;

/// Run the server until a shutdown signal arrives
pub async fn run(config: Config, config_path: &Path) -> Result<()> {
    info!(config = %config_path.display(), "starting porter");

    let provider = build_provider(&config.identity)?;

    let db_path = config.store.db_path();
    let store = SqliteProfileStore::open(&db_path)
        .await
        .with_context(|| format!("failed to open profile store at {}", db_path.display()))?;
    info!(path = %db_path.display(), "profile store ready");

    let options = StateOptions {
        paths: gate_paths(&config.gate),
        refresh_margin: config.identity.refresh_margin,
        profile_wait: config.identity.profile_wait,
        cookies: CookieSettings {
            secure: config.server.cookie_secure,
            domain: config.server.cookie_domain.clone(),
        },
    };
    let state = AppState::with_options(Arc::new(provider), Arc::new(store), options);

    let router_options = RouterOptions {
        audit_logging: config.server.audit_logging,
        pages_dir: config.server.pages_dir.clone(),
    };

    let app = build_router_with_options(state, router_options)
        .layer(TimeoutLayer::new(config.server.request_timeout))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(
        addr = %addr,
        audit_logging = config.server.audit_logging,
        pages_dir = ?config.server.pages_dir,
        "porter listening"
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("shutdown signal received, stopping server...");
        shutdown.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

/// Identity provider client from the `[identity]` section
fn build_provider(identity: &IdentityConfig) -> Result<HttpIdentityProvider> {
    let provider = HttpIdentityProvider::new(
        identity.base_url.trim(),
        identity.api_key.clone(),
        identity.request_timeout,
    )
    .context("failed to build identity provider client")?;

    let provider = match &identity.jwt_secret {
        Some(secret) => {
            info!(base_url = %identity.base_url, "verifying access tokens locally");
            provider.with_jwt_secret(secret.as_bytes())
        }
        None => {
            info!(base_url = %identity.base_url, "verifying access tokens with the provider");
            provider
        }
    };

    if identity.api_key.is_empty() {
        warn!("identity.api_key is empty; most providers reject unauthenticated calls");
    }

    Ok(provider)
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_build_provider_from_config() {
        let config = Config::from_str(
            "[identity]\nbase_url = \"https://id.example.com/\"\napi_key = \"anon\"\njwt_secret = \"0123456789abcdef0123456789abcdef\"\n",
        )
        .unwrap();
        assert!(build_provider(&config.identity).is_ok());
    }
}
