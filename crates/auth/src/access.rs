//! Access decision engine
//!
//! A pure function of (authenticated?, path, role state) to allow or
//! redirect. Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. Anonymous on a protected path: sign-in
//! 2. Signed in on an auth-entry page: dashboard
//! 3. Signed in, no selected role, protected path (except role-selection and
//!    the worker-profile escape hatch): role-selection
//! 4. Signed in on the landing page: dashboard
//! 5. Signed in on a legacy alias: dashboard
//! 6. Otherwise: allow
//!
//! The engine never touches storage; callers hand it a `RoleState` snapshot.

use serde::{Deserialize, Serialize};

use crate::roles::RoleName;

/// Role state of the caller's profile, as seen by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleState {
    /// Profile has a selected role
    Selected(RoleName),
    /// No profile, or a profile without a selected role
    Missing,
    /// The profile lookup failed; gated exactly like `Missing`
    Unavailable,
}

impl RoleState {
    /// Whether a role is selected
    pub fn has_role(&self) -> bool {
        matches!(self, Self::Selected(_))
    }
}

/// Everything the engine looks at for one request
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    /// Whether the session resolved to an identity
    pub authenticated: bool,
    /// Request path, without query string
    pub path: &'a str,
    /// Profile snapshot (ignored when anonymous)
    pub role: RoleState,
}

/// Why a request was redirected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    /// Protected path without a session
    SignInRequired,
    /// Auth-entry page with a session
    AlreadySignedIn,
    /// Protected path without a selected role
    RoleSelectionRequired,
    /// Bare landing page with a session
    LandingPage,
    /// Legacy alias of the dashboard
    LegacyPath,
}

impl RedirectReason {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignInRequired => "sign_in_required",
            Self::AlreadySignedIn => "already_signed_in",
            Self::RoleSelectionRequired => "role_selection_required",
            Self::LandingPage => "landing_page",
            Self::LegacyPath => "legacy_path",
        }
    }
}

/// Outcome for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Forward unchanged
    Allow,
    /// Send the caller elsewhere
    Redirect {
        /// Target path
        to: String,
        /// Rule that fired
        reason: RedirectReason,
    },
}

impl Decision {
    fn redirect(to: &str, reason: RedirectReason) -> Self {
        Self::Redirect {
            to: to.to_string(),
            reason,
        }
    }

    /// Whether the request may proceed
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Paths the engine knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatePaths {
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
    /// Worker-profile creation page (exempt from rule 3)
    pub create_worker_profile: String,
    /// Landing page
    pub landing: String,
    /// Protected namespace prefixes
    pub protected_prefixes: Vec<String>,
    /// Legacy aliases redirected to the dashboard
    pub legacy_aliases: Vec<String>,
}

impl Default for GatePaths {
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

/// Segment-aware prefix match: `/a` matches `/a` and `/a/b`, not `/ab`
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Exact path match ignoring a trailing slash
fn same_path(path: &str, target: &str) -> bool {
    let trim = |p: &str| {
        let t = p.trim_end_matches('/');
        if t.is_empty() { "/" } else { t }.to_string()
    };
    trim(path) == trim(target)
}

/// Evaluates the gate rules against configured paths
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    paths: GatePaths,
}

impl AccessPolicy {
    /// Create a policy for the given paths
    pub fn new(paths: GatePaths) -> Self {
        Self { paths }
    }

    /// Configured paths
    pub fn paths(&self) -> &GatePaths {
        &self.paths
    }

    /// Whether `path` is in the protected namespace
    pub fn is_protected(&self, path: &str) -> bool {
        self.paths
            .protected_prefixes
            .iter()
            .any(|p| path_has_prefix(path, p))
    }

    fn is_auth_entry(&self, path: &str) -> bool {
        [
            &self.paths.sign_in,
            &self.paths.sign_up,
            &self.paths.forgot_password,
        ]
        .iter()
        .any(|p| same_path(path, p))
    }

    fn is_role_exempt(&self, path: &str) -> bool {
        path_has_prefix(path, &self.paths.role_selection)
            || path_has_prefix(path, &self.paths.create_worker_profile)
    }

    fn is_legacy(&self, path: &str) -> bool {
        self.paths
            .legacy_aliases
            .iter()
            .any(|p| path_has_prefix(path, p))
    }

    /// Whether the decision depends on the role state
    ///
    /// Lets the gate skip the profile lookup when the answer cannot change.
    pub fn needs_role_state(&self, path: &str) -> bool {
        self.is_protected(path) && !self.is_role_exempt(path) && !self.is_auth_entry(path)
    }

    /// Decide one request
    pub fn decide(&self, req: &AccessRequest<'_>) -> Decision {
        let path = req.path;

        if !req.authenticated {
            if self.is_protected(path) {
                return Decision::redirect(&self.paths.sign_in, RedirectReason::SignInRequired);
            }
            return Decision::Allow;
        }

        if self.is_auth_entry(path) {
            return Decision::redirect(&self.paths.dashboard, RedirectReason::AlreadySignedIn);
        }

        if !req.role.has_role() && self.is_protected(path) && !self.is_role_exempt(path) {
            return Decision::redirect(
                &self.paths.role_selection,
                RedirectReason::RoleSelectionRequired,
            );
        }

        if same_path(path, &self.paths.landing) {
            return Decision::redirect(&self.paths.dashboard, RedirectReason::LandingPage);
        }

        if self.is_legacy(path) {
            return Decision::redirect(&self.paths.dashboard, RedirectReason::LegacyPath);
        }

        Decision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AccessPolicy {
        AccessPolicy::default()
    }

    fn decide(authenticated: bool, path: &str, role: RoleState) -> Decision {
        policy().decide(&AccessRequest {
            authenticated,
            path,
            role,
        })
    }

    fn redirect(to: &str, reason: RedirectReason) -> Decision {
        Decision::Redirect {
            to: to.into(),
            reason,
        }
    }

    const CUSTOMER: RoleState = RoleState::Selected(RoleName::Customer);

    #[test]
    fn test_prefix_matching_is_segment_aware() {
        assert!(path_has_prefix("/dashboard", "/dashboard"));
        assert!(path_has_prefix("/dashboard/", "/dashboard"));
        assert!(path_has_prefix("/dashboard/jobs/1", "/dashboard"));
        assert!(!path_has_prefix("/dashboards", "/dashboard"));
        assert!(!path_has_prefix("/", "/dashboard"));
        assert!(path_has_prefix("/anything", "/"));
    }

    #[test]
    fn test_anonymous_on_protected_goes_to_sign_in() {
        for path in ["/dashboard", "/dashboard/bookings", "/protected", "/role-selection"] {
            assert_eq!(
                decide(false, path, RoleState::Missing),
                redirect("/sign-in", RedirectReason::SignInRequired),
                "path {}",
                path
            );
        }
    }

    #[test]
    fn test_anonymous_on_public_is_allowed() {
        for path in ["/", "/sign-in", "/sign-up", "/forgot-password", "/about", "/dashboards"] {
            assert!(decide(false, path, RoleState::Missing).is_allow(), "path {}", path);
        }
    }

    #[test]
    fn test_signed_in_on_auth_entry_goes_to_dashboard() {
        for path in ["/sign-in", "/sign-up", "/forgot-password", "/sign-in/"] {
            assert_eq!(
                decide(true, path, CUSTOMER),
                redirect("/dashboard", RedirectReason::AlreadySignedIn)
            );
        }
        // Rule 2 outranks rule 3
        assert_eq!(
            decide(true, "/sign-in", RoleState::Missing),
            redirect("/dashboard", RedirectReason::AlreadySignedIn)
        );
    }

    #[test]
    fn test_role_less_goes_to_role_selection() {
        for state in [RoleState::Missing, RoleState::Unavailable] {
            assert_eq!(
                decide(true, "/dashboard", state),
                redirect("/role-selection", RedirectReason::RoleSelectionRequired)
            );
            assert_eq!(
                decide(true, "/protected/settings", state),
                redirect("/role-selection", RedirectReason::RoleSelectionRequired)
            );
        }
    }

    #[test]
    fn test_role_selection_never_blocked_for_role_less() {
        for state in [RoleState::Missing, RoleState::Unavailable] {
            assert!(decide(true, "/role-selection", state).is_allow());
        }
    }

    #[test]
    fn test_worker_profile_escape_hatch() {
        assert!(decide(true, "/dashboard/create-worker-profile", RoleState::Missing).is_allow());
        assert!(
            decide(true, "/dashboard/create-worker-profile", RoleState::Unavailable).is_allow()
        );
        // Still requires a session
        assert_eq!(
            decide(false, "/dashboard/create-worker-profile", RoleState::Missing),
            redirect("/sign-in", RedirectReason::SignInRequired)
        );
    }

    #[test]
    fn test_landing_redirects_signed_in() {
        assert_eq!(
            decide(true, "/", CUSTOMER),
            redirect("/dashboard", RedirectReason::LandingPage)
        );
    }

    #[test]
    fn test_legacy_alias() {
        assert_eq!(
            decide(true, "/protected", CUSTOMER),
            redirect("/dashboard", RedirectReason::LegacyPath)
        );
        assert_eq!(
            decide(true, "/protected/old", CUSTOMER),
            redirect("/dashboard", RedirectReason::LegacyPath)
        );
    }

    #[test]
    fn test_role_selected_dashboard_allowed() {
        assert!(decide(true, "/dashboard", CUSTOMER).is_allow());
        assert!(decide(true, "/dashboard/jobs", RoleState::Selected(RoleName::Worker)).is_allow());
    }

    #[test]
    fn test_role_selected_unprotected_never_redirected() {
        for path in ["/about", "/pricing", "/workers/42", "/dashboards", "/api/v1/profile"] {
            for role in RoleName::ALL {
                assert!(
                    decide(true, path, RoleState::Selected(role)).is_allow(),
                    "path {}",
                    path
                );
            }
        }
    }

    #[test]
    fn test_needs_role_state() {
        let p = policy();
        assert!(p.needs_role_state("/dashboard"));
        assert!(p.needs_role_state("/protected"));
        assert!(!p.needs_role_state("/role-selection"));
        assert!(!p.needs_role_state("/dashboard/create-worker-profile"));
        assert!(!p.needs_role_state("/about"));
    }

    #[test]
    fn test_custom_paths() {
        let paths = GatePaths {
            sign_in: "/login".into(),
            protected_prefixes: vec!["/app".into()],
            legacy_aliases: vec![],
            ..GatePaths::default()
        };
        let policy = AccessPolicy::new(paths);

        let decision = policy.decide(&AccessRequest {
            authenticated: false,
            path: "/app/home",
            role: RoleState::Missing,
        });
        assert_eq!(decision, redirect("/login", RedirectReason::SignInRequired));

        let decision = policy.decide(&AccessRequest {
            authenticated: false,
            path: "/dashboard",
            role: RoleState::Missing,
        });
        assert!(decision.is_allow());
    }
}
