//! Profile and role records
//!
//! Rows owned by the relational store. `Profile.selected_role` is the only
//! field the access gate reads; everything else is bookkeeping for the
//! bootstrap and role-switch flows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::roles::RoleName;

/// Account status on the profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Normal account
    #[default]
    Active,
    /// Temporarily blocked by moderation
    Suspended,
    /// Closed by the owner
    Deactivated,
}

impl AccountStatus {
    /// Parse status from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "deactivated" | "inactive" => Some(Self::Deactivated),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deactivated => "deactivated",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable display and role state of a bootstrapped identity
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    /// Identity ID (1:1)
    pub id: String,
    /// Display name
    pub full_name: String,
    /// Avatar mirrored from the identity provider
    pub avatar_url: Option<String>,
    /// Role the identity currently operates under; `None` until chosen
    pub selected_role: Option<RoleName>,
    /// Account status
    pub account_status: AccountStatus,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated
    pub updated_at: DateTime<Utc>,
}

/// Profile fields written by bootstrap
///
/// Deliberately has no `selected_role`: bootstrap must never choose a role
/// on the user's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    /// Identity ID
    pub id: String,
    /// Display name
    pub full_name: String,
    /// Avatar URL
    pub avatar_url: Option<String>,
}

impl NewProfile {
    /// Populate from federated identity attributes
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            full_name: identity.full_name(),
            avatar_url: identity.avatar_url.clone(),
        }
    }
}

/// Grant permitting an identity to operate under a role
#[derive(Debug, Clone, Serialize)]
pub struct RoleAssignment {
    /// Identity ID
    pub user_id: String,
    /// Granted role
    pub role: RoleName,
    /// When the grant was created
    pub created_at: DateTime<Utc>,
}

/// Worker-specific profile
#[derive(Debug, Clone, Serialize)]
pub struct WorkerProfile {
    /// Identity ID
    pub id: String,
    /// One-line pitch
    pub headline: Option<String>,
    /// Longer description
    pub bio: Option<String>,
    /// Hourly rate in minor currency units
    pub hourly_rate: Option<i64>,
    /// Completed jobs
    pub total_jobs: i64,
    /// Average rating (0.0 until first review)
    pub rating: f64,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
}

/// Customer-specific profile
#[derive(Debug, Clone, Serialize)]
pub struct CustomerProfile {
    /// Identity ID
    pub id: String,
    /// Bookings made
    pub total_bookings: i64,
    /// Amount spent in minor currency units
    pub total_spent: i64,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new worker profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorkerProfileDraft {
    /// One-line pitch
    #[serde(default)]
    pub headline: Option<String>,
    /// Longer description
    #[serde(default)]
    pub bio: Option<String>,
    /// Hourly rate in minor currency units
    #[serde(default)]
    pub hourly_rate: Option<i64>,
}

/// Maximum headline length in characters
pub const MAX_HEADLINE_LEN: usize = 120;

/// Maximum bio length in characters
pub const MAX_BIO_LEN: usize = 2000;

impl WorkerProfileDraft {
    /// Validate field limits, returning a message for the first violation
    pub fn validate(&self) -> Result<(), String> {
        if let Some(headline) = &self.headline
            && headline.chars().count() > MAX_HEADLINE_LEN
        {
            return Err(format!(
                "headline must be at most {} characters",
                MAX_HEADLINE_LEN
            ));
        }
        if let Some(bio) = &self.bio
            && bio.chars().count() > MAX_BIO_LEN
        {
            return Err(format!("bio must be at most {} characters", MAX_BIO_LEN));
        }
        if let Some(rate) = self.hourly_rate
            && rate < 0
        {
            return Err("hourly_rate must not be negative".to_string());
        }
        Ok(())
    }
}

/// Row that must exist, with the defaults to use when creating it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureRow {
    /// `role_assignments(user_id, role_name)`
    RoleAssignment {
        /// Identity ID
        user_id: String,
        /// Role to grant
        role: RoleName,
    },
    /// `customer_profiles(id)` with zeroed counters
    CustomerProfile {
        /// Identity ID
        user_id: String,
    },
    /// `worker_profiles(id)` seeded from a draft
    WorkerProfile {
        /// Identity ID
        user_id: String,
        /// Initial fields
        draft: WorkerProfileDraft,
    },
}

impl EnsureRow {
    /// Table the row lives in (for logging)
    pub fn table(&self) -> &'static str {
        match self {
            Self::RoleAssignment { .. } => "role_assignments",
            Self::CustomerProfile { .. } => "customer_profiles",
            Self::WorkerProfile { .. } => "worker_profiles",
        }
    }
}

/// Outcome of an `ensure_exists` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensured {
    /// Row was inserted by this call
    Created,
    /// Row was already present (including a concurrent insert)
    Existing,
}
