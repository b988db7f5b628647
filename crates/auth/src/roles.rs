//! Marketplace roles
//!
//! Two flat, mutually exclusive capability sets. An identity may hold both
//! grants but operates under exactly one at a time (`Profile.selected_role`).
//!
//! - `Customer` - books work; granted by default during bootstrap
//! - `Worker` - performs work; granted on first selection

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role an identity can operate under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleName {
    /// Books work and leaves reviews
    Customer,
    /// Offers and performs work
    Worker,
}

impl RoleName {
    /// All known roles, in catalog order
    pub const ALL: [RoleName; 2] = [RoleName::Customer, RoleName::Worker];

    /// Parse role from its canonical name
    ///
    /// Matching is exact: role names arrive from request bodies and the
    /// store, and anything else is invalid input.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "worker" => Some(Self::Worker),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Worker => "worker",
        }
    }

    /// Role granted to every identity during bootstrap
    pub fn default_grant() -> Self {
        Self::Customer
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(RoleName::parse("customer"), Some(RoleName::Customer));
        assert_eq!(RoleName::parse("worker"), Some(RoleName::Worker));
        assert_eq!(RoleName::parse("admin"), None);
        assert_eq!(RoleName::parse("Worker"), None);
        assert_eq!(RoleName::parse(" worker"), None);
        assert_eq!(RoleName::parse(""), None);
    }

    #[test]
    fn test_round_trip_names() {
        for role in RoleName::ALL {
            assert_eq!(RoleName::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_default_grant() {
        assert_eq!(RoleName::default_grant(), RoleName::Customer);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&RoleName::Worker).unwrap();
        assert_eq!(json, "\"worker\"");
        let role: RoleName = serde_json::from_str("\"customer\"").unwrap();
        assert_eq!(role, RoleName::Customer);
    }
}
