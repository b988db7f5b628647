//! Identity bootstrap
//!
//! Runs when the identity provider redirects back after a federated
//! sign-in. Exchanges the authorization code for a session, then makes sure
//! the identity has a profile, the default customer grant and a customer
//! profile. Every provisioning step is idempotent; a failing step is logged
//! and the remaining steps still run. The caller always gets a redirect.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::GatePaths;
use crate::error::{AuthError, Result};
use crate::identity::Identity;
use crate::profile::{EnsureRow, Ensured, NewProfile, Profile};
use crate::provider::IdentityProvider;
use crate::roles::RoleName;
use crate::session::SessionTokens;
use crate::store::ProfileStore;

/// Default wait for an externally created profile to become visible
pub const DEFAULT_PROFILE_WAIT: Duration = Duration::from_secs(1);

/// Query parameters of the provider's redirect
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    #[serde(default)]
    pub code: Option<String>,
    /// OAuth error
    #[serde(default)]
    pub error: Option<String>,
    /// Provider-specific error code
    #[serde(default)]
    pub error_code: Option<String>,
    /// Human-readable error
    #[serde(default)]
    pub error_description: Option<String>,
    /// Where to go when there is nothing to bootstrap
    #[serde(default)]
    pub redirect_to: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl CallbackParams {
    /// Provider error message, most descriptive field first
    pub fn error_message(&self) -> Option<&str> {
        non_empty(&self.error_description)
            .or_else(|| non_empty(&self.error_code))
            .or_else(|| non_empty(&self.error))
    }

    /// Authorization code, if one was sent
    pub fn code(&self) -> Option<&str> {
        non_empty(&self.code)
    }
}

/// Accept only same-origin absolute paths as redirect targets
pub fn safe_redirect_target(raw: &str) -> Option<&str> {
    let ok = raw.starts_with('/')
        && !raw.starts_with("//")
        && !raw.contains('\\')
        && !raw.chars().any(char::is_control);
    ok.then_some(raw)
}

/// Where the callback sends the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackRedirect {
    /// Back to sign-in with a message
    SignIn {
        /// Shown on the sign-in page
        message: String,
    },
    /// On to role selection
    RoleSelection,
    /// A caller-supplied path, or the dashboard
    Target(String),
}

impl CallbackRedirect {
    /// Concrete `Location` value
    pub fn location(&self, paths: &GatePaths) -> String {
        match self {
            Self::SignIn { message } => {
                match serde_urlencoded::to_string([("error", message.as_str())]) {
                    Ok(query) => format!("{}?{}", paths.sign_in, query),
                    Err(_) => paths.sign_in.clone(),
                }
            }
            Self::RoleSelection => paths.role_selection.clone(),
            Self::Target(path) => path.clone(),
        }
    }
}

/// Result of one provisioning step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    /// Row written by this run
    Created,
    /// Row already present
    Existing,
    /// Step not run
    #[default]
    Skipped,
    /// Step failed (logged, non-fatal)
    Failed,
}

impl From<Ensured> for StepOutcome {
    fn from(value: Ensured) -> Self {
        match value {
            Ensured::Created => Self::Created,
            Ensured::Existing => Self::Existing,
        }
    }
}

impl StepOutcome {
    fn from_result(result: Result<Ensured>, step: &str, user_id: &str) -> Self {
        match result {
            Ok(ensured) => ensured.into(),
            Err(e) => {
                warn!(user_id, step, error = %e, "bootstrap step failed");
                Self::Failed
            }
        }
    }
}

/// What provisioning did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    /// Profile row
    pub profile: StepOutcome,
    /// Default role grant
    pub role_assignment: StepOutcome,
    /// Customer profile
    pub customer_profile: StepOutcome,
    /// Profile already had a selected role; nothing was provisioned
    pub already_bootstrapped: bool,
}

impl ProvisionReport {
    /// Any step failed
    pub fn has_failures(&self) -> bool {
        [self.profile, self.role_assignment, self.customer_profile].contains(&StepOutcome::Failed)
    }
}

/// Everything the transport needs to answer the callback
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    /// Redirect target
    pub redirect: CallbackRedirect,
    /// New session to write as cookies
    pub session: Option<SessionTokens>,
    /// Identity ID, when resolved
    pub user_id: Option<String>,
    /// Provisioning report
    pub report: ProvisionReport,
}

impl CallbackOutcome {
    fn redirect_only(redirect: CallbackRedirect) -> Self {
        Self {
            redirect,
            session: None,
            user_id: None,
            report: ProvisionReport::default(),
        }
    }
}

/// Runs the post sign-in bootstrap
#[derive(Clone)]
pub struct BootstrapService {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    paths: GatePaths,
    profile_wait: Duration,
}

impl BootstrapService {
    /// Create a service with default paths and wait
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            provider,
            store,
            paths: GatePaths::default(),
            profile_wait: DEFAULT_PROFILE_WAIT,
        }
    }

    /// Set the gate paths used for redirects
    #[must_use]
    pub fn with_paths(mut self, paths: GatePaths) -> Self {
        self.paths = paths;
        self
    }

    /// Set the profile visibility wait (`Duration::ZERO` disables it)
    #[must_use]
    pub fn with_profile_wait(mut self, wait: Duration) -> Self {
        self.profile_wait = wait;
        self
    }

    /// Handle one callback
    pub async fn handle(
        &self,
        params: &CallbackParams,
        code_verifier: Option<&str>,
    ) -> CallbackOutcome {
        if let Some(message) = params.error_message() {
            info!(error = message, "sign-in failed at identity provider");
            return CallbackOutcome::redirect_only(CallbackRedirect::SignIn {
                message: message.to_string(),
            });
        }

        let Some(code) = params.code() else {
            let location = params
                .redirect_to
                .as_deref()
                .and_then(safe_redirect_target)
                .unwrap_or(self.paths.dashboard.as_str());
            debug!(location, "callback without code");
            return CallbackOutcome::redirect_only(CallbackRedirect::Target(location.to_string()));
        };

        let session = match self.provider.exchange_code(code, code_verifier).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "code exchange failed");
                return CallbackOutcome::redirect_only(CallbackRedirect::SignIn {
                    message: exchange_message(&e),
                });
            }
        };

        let identity = match self.provider.identity(&session.access_token).await {
            Ok(identity) => identity,
            Err(e) => {
                // Role selection self-heals the missing rows later
                warn!(error = %e, "identity lookup after code exchange failed");
                return CallbackOutcome {
                    redirect: CallbackRedirect::RoleSelection,
                    session: Some(session),
                    user_id: None,
                    report: ProvisionReport::default(),
                };
            }
        };

        let report = self.provision(&identity).await;
        if report.has_failures() {
            warn!(user_id = %identity.id, ?report, "bootstrap incomplete");
        } else {
            info!(user_id = %identity.id, ?report, "bootstrap complete");
        }

        CallbackOutcome {
            redirect: CallbackRedirect::RoleSelection,
            session: Some(session),
            user_id: Some(identity.id),
            report,
        }
    }

    /// Idempotent provisioning for a resolved identity
    pub async fn provision(&self, identity: &Identity) -> ProvisionReport {
        let user_id = identity.id.as_str();
        let existing = self.wait_for_profile(user_id).await;

        if existing.as_ref().is_some_and(|p| p.selected_role.is_some()) {
            debug!(user_id, "profile already has a role");
            return ProvisionReport {
                already_bootstrapped: true,
                ..Default::default()
            };
        }

        let profile = match self
            .store
            .upsert_profile(&NewProfile::from_identity(identity))
            .await
        {
            Ok(()) if existing.is_some() => StepOutcome::Existing,
            Ok(()) => StepOutcome::Created,
            Err(e) => {
                warn!(user_id, step = "profile", error = %e, "bootstrap step failed");
                StepOutcome::Failed
            }
        };

        let role_assignment = StepOutcome::from_result(
            self.store
                .ensure_exists(&EnsureRow::RoleAssignment {
                    user_id: user_id.to_string(),
                    role: RoleName::default_grant(),
                })
                .await,
            "role_assignment",
            user_id,
        );

        let customer_profile = StepOutcome::from_result(
            self.store
                .ensure_exists(&EnsureRow::CustomerProfile {
                    user_id: user_id.to_string(),
                })
                .await,
            "customer_profile",
            user_id,
        );

        ProvisionReport {
            profile,
            role_assignment,
            customer_profile,
            already_bootstrapped: false,
        }
    }

    /// Read the profile, waiting once if it is not there yet
    async fn wait_for_profile(&self, user_id: &str) -> Option<Profile> {
        if let Some(profile) = self.read_profile(user_id).await {
            return Some(profile);
        }
        if self.profile_wait.is_zero() {
            return None;
        }
        tokio::time::sleep(self.profile_wait).await;
        self.read_profile(user_id).await
    }

    async fn read_profile(&self, user_id: &str) -> Option<Profile> {
        match self.store.get_profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id, error = %e, "profile lookup failed during bootstrap");
                None
            }
        }
    }
}

fn exchange_message(err: &AuthError) -> String {
    match err {
        AuthError::CodeExchangeFailed(message) | AuthError::CredentialRejected(message) => {
            message.clone()
        }
        AuthError::UpstreamUnavailable(_) => {
            "Sign-in is temporarily unavailable, please try again".to_string()
        }
        other => other.to_string(),
    }
}
