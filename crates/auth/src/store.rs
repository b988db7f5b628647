//! Profile store trait
//!
//! Abstracts the relational store holding profiles, the role catalog, role
//! grants and role profiles. The services only ever go through this trait;
//! `SqliteProfileStore` is the shipped implementation.
//!
//! Concurrency safety comes from the store's uniqueness constraints:
//! `ensure_exists` turns a duplicate-key race into `Ensured::Existing`, so
//! callers never see a conflict as an error.

use async_trait::async_trait;

use crate::error::Result;
use crate::profile::{
    CustomerProfile, EnsureRow, Ensured, NewProfile, Profile, RoleAssignment, WorkerProfile,
};
use crate::roles::RoleName;

/// Storage for profiles, role grants and role profiles
#[async_trait]
pub trait ProfileStore: Send + Sync {
    // =========================================================================
    // Profiles
    // =========================================================================

    /// Get a profile by identity ID
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Create the profile or refresh its display fields
    ///
    /// Never touches `selected_role`.
    async fn upsert_profile(&self, profile: &NewProfile) -> Result<()>;

    /// Set `selected_role`, creating the profile from `profile` if missing
    async fn set_selected_role(&self, profile: &NewProfile, role: RoleName) -> Result<()>;

    // =========================================================================
    // Roles
    // =========================================================================

    /// Whether the role catalog knows `role`
    async fn role_in_catalog(&self, role: RoleName) -> Result<bool>;

    /// Get a single role grant
    async fn get_role_assignment(
        &self,
        user_id: &str,
        role: RoleName,
    ) -> Result<Option<RoleAssignment>>;

    /// All role grants for an identity
    async fn list_role_assignments(&self, user_id: &str) -> Result<Vec<RoleAssignment>>;

    // =========================================================================
    // Provisioning
    // =========================================================================

    /// Insert `row` unless it already exists
    ///
    /// A uniqueness conflict, including one caused by a concurrent insert,
    /// yields `Ensured::Existing`.
    async fn ensure_exists(&self, row: &EnsureRow) -> Result<Ensured>;

    /// Get the worker profile for an identity
    async fn get_worker_profile(&self, user_id: &str) -> Result<Option<WorkerProfile>>;

    /// Get the customer profile for an identity
    async fn get_customer_profile(&self, user_id: &str) -> Result<Option<CustomerProfile>>;
}
