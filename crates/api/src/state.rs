//! Application state
//!
//! Shared, immutable services for the gate and the handlers. The only mutable
//! state lives behind the identity provider and the profile store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use porter_auth::{
    AccessPolicy, BootstrapService, DEFAULT_PROFILE_WAIT, DEFAULT_REFRESH_MARGIN, GatePaths,
    IdentityProvider, ProfileStore, RoleSwitchService, SessionResolver,
};

use crate::auth::CookieSettings;

/// Tunables for [`AppState`]
#[derive(Debug, Clone)]
pub struct StateOptions {
    /// Gate paths
    pub paths: GatePaths,
    /// Refresh credentials this long before expiry
    pub refresh_margin: Duration,
    /// Bootstrap wait for an externally created profile
    pub profile_wait: Duration,
    /// Cookie attributes
    pub cookies: CookieSettings,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            paths: GatePaths::default(),
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            profile_wait: DEFAULT_PROFILE_WAIT,
            cookies: CookieSettings::default(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Validates and refreshes session cookies
    pub resolver: Arc<SessionResolver>,
    /// Access decisions
    pub policy: Arc<AccessPolicy>,
    /// Post sign-in provisioning
    pub bootstrap: Arc<BootstrapService>,
    /// Role selection and worker profiles
    pub roles: Arc<RoleSwitchService>,
    /// Profile store (role state lookups in the gate)
    pub store: Arc<dyn ProfileStore>,
    /// Cookie attributes
    pub cookies: CookieSettings,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Create state with default paths and timings
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn ProfileStore>) -> Self {
        Self::with_options(provider, store, StateOptions::default())
    }

    /// Create state with explicit options
    pub fn with_options(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn ProfileStore>,
        options: StateOptions,
    ) -> Self {
        let resolver = SessionResolver::new(Arc::clone(&provider))
            .with_refresh_margin(options.refresh_margin);
        let bootstrap = BootstrapService::new(provider, Arc::clone(&store))
            .with_paths(options.paths.clone())
            .with_profile_wait(options.profile_wait);

        Self {
            resolver: Arc::new(resolver),
            policy: Arc::new(AccessPolicy::new(options.paths)),
            bootstrap: Arc::new(bootstrap),
            roles: Arc::new(RoleSwitchService::new(Arc::clone(&store))),
            store,
            cookies: options.cookies,
            started_at: Instant::now(),
        }
    }

    /// Gate paths in effect
    pub fn paths(&self) -> &GatePaths {
        self.policy.paths()
    }

    /// Seconds since the state was built
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
