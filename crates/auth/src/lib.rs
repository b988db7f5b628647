//! Porter - Authentication
//!
//! Session resolution, access gating, identity bootstrap and role switching
//! for a two-sided marketplace.
//!
//! # Overview
//!
//! Two flat, mutually exclusive roles:
//!
//! | Role | Capabilities |
//! |------|--------------|
//! | `Customer` | Books work; granted to everyone at bootstrap |
//! | `Worker` | Performs work; granted on first selection |
//!
//! # Request Flow
//!
//! ```text
//! cookies ─► SessionResolver ─► AccessPolicy ─► allow | redirect
//!               │ refresh            ▲
//!               ▼                    │ RoleState
//!         IdentityProvider      ProfileStore
//! ```
//!
//! After a federated sign-in the provider redirects to the callback, which
//! runs `BootstrapService`. The role-selection page drives
//! `RoleSwitchService`.
//!
//! Credential checks are delegated to the external identity provider
//! (`HttpIdentityProvider`); `JwtVerifier` only short-circuits the lookup when
//! the provider's signing secret is configured.

mod access;
mod bootstrap;
mod claims;
mod error;
mod identity;
mod profile;
mod provider;
mod role_switch;
mod roles;
mod session;
mod sqlite_store;
mod store;

/// In-process identity provider, faulty store and JWT helpers for tests
pub mod test_utils;

pub use error::{AuthError, Result};

// Identity and claims
pub use claims::{AccessTokenClaims, bare_token};
pub use identity::{Identity, ProviderUser};
pub use roles::RoleName;

// Identity provider
pub use provider::{HttpIdentityProvider, IdentityProvider, JwtVerifier};

// Session resolution
pub use session::{
    CredentialAction, Credentials, DEFAULT_REFRESH_MARGIN, ResolvedSession, SessionResolver,
    SessionTokens,
};

// Access decisions
pub use access::{
    AccessPolicy, AccessRequest, Decision, GatePaths, RedirectReason, RoleState, path_has_prefix,
};

// Profiles and storage
pub use profile::{
    AccountStatus, CustomerProfile, EnsureRow, Ensured, MAX_BIO_LEN, MAX_HEADLINE_LEN,
    NewProfile, Profile, RoleAssignment, WorkerProfile, WorkerProfileDraft,
};
pub use sqlite_store::SqliteProfileStore;
pub use store::ProfileStore;

// Workflows
pub use bootstrap::{
    BootstrapService, CallbackOutcome, CallbackParams, CallbackRedirect, DEFAULT_PROFILE_WAIT,
    ProvisionReport, StepOutcome, safe_redirect_target,
};
pub use role_switch::{ProfileSummary, RoleSelection, RoleSwitchService, WorkerProvisioning};
