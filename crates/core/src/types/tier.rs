//! Internal permission tiers.
//!
//! Tiers are ordered: `Agent < Lead < Admin < Head`. Authorization checks
//! compare with `>=`, so a `Head` passes every gate an `Admin` passes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Display metadata for a [`PermissionTier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierInfo {
    /// Human-readable name.
    pub display_name: &'static str,
    /// One-line description of what the tier grants.
    pub description: &'static str,
}

/// Error returned when a string does not name a tier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid permission tier: {0}")]
pub struct ParseTierError(pub String);

/// The four-level internal authorization rank.
///
/// The local record is authoritative for the tier; the broker only mirrors it
/// as a realm role named by [`PermissionTier::as_str`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionTier {
    /// Base tier given to every self-registered account.
    #[default]
    Agent,
    /// Team lead.
    Lead,
    /// Administrator.
    Admin,
    /// Full access.
    Head,
}

const TIER_INFO: [(PermissionTier, TierInfo); 4] = [
    (
        PermissionTier::Agent,
        TierInfo {
            display_name: "Agent",
            description: "Standard user with basic features",
        },
    ),
    (
        PermissionTier::Lead,
        TierInfo {
            display_name: "Lead",
            description: "Team management and advanced features",
        },
    ),
    (
        PermissionTier::Admin,
        TierInfo {
            display_name: "Administrator",
            description: "Administrative features and reporting",
        },
    ),
    (
        PermissionTier::Head,
        TierInfo {
            display_name: "Head",
            description: "Full system access and user management",
        },
    ),
];

impl PermissionTier {
    /// Every tier, lowest first.
    pub const ALL: [Self; 4] = [Self::Agent, Self::Lead, Self::Admin, Self::Head];

    /// Lowercase storage value, also used as the broker realm role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Lead => "lead",
            Self::Admin => "admin",
            Self::Head => "head",
        }
    }

    /// Display name and description from the tier table.
    #[must_use]
    #[allow(clippy::indexing_slicing)] // discriminants are 0..=3, matching the table order
    pub const fn info(self) -> TierInfo {
        TIER_INFO[self as usize].1
    }

    /// Whether this tier satisfies a gate requiring `required`.
    #[must_use]
    pub fn at_least(self, required: Self) -> bool {
        self >= required
    }

    /// Whether a broker realm role name belongs to the tier set.
    #[must_use]
    pub fn is_tier_role(name: &str) -> bool {
        Self::ALL
            .iter()
            .any(|tier| tier.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PermissionTier {
    /// Formats as the role-claim value (`Agent`, `Lead`, `Admin`, `Head`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Agent => "Agent",
            Self::Lead => "Lead",
            Self::Admin => "Admin",
            Self::Head => "Head",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for PermissionTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseTierError(s.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_are_ordered() {
        assert!(PermissionTier::Agent < PermissionTier::Lead);
        assert!(PermissionTier::Lead < PermissionTier::Admin);
        assert!(PermissionTier::Admin < PermissionTier::Head);
        assert!(PermissionTier::Head.at_least(PermissionTier::Lead));
        assert!(!PermissionTier::Agent.at_least(PermissionTier::Lead));
    }

    #[test]
    fn test_info_table_matches_variant() {
        for (tier, info) in TIER_INFO {
            assert_eq!(tier.info(), info);
        }
        assert_eq!(PermissionTier::Admin.info().display_name, "Administrator");
        assert_eq!(
            PermissionTier::Agent.info().description,
            "Standard user with basic features"
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("HEAD".parse::<PermissionTier>().unwrap(), PermissionTier::Head);
        assert_eq!(" lead ".parse::<PermissionTier>().unwrap(), PermissionTier::Lead);
        assert!("owner".parse::<PermissionTier>().is_err());
    }

    #[test]
    fn test_display_and_storage_names() {
        assert_eq!(PermissionTier::Head.to_string(), "Head");
        assert_eq!(PermissionTier::Head.as_str(), "head");
        assert!(PermissionTier::is_tier_role("Agent"));
        assert!(!PermissionTier::is_tier_role("kitchen"));
    }

    #[test]
    fn test_default_is_base_tier() {
        assert_eq!(PermissionTier::default(), PermissionTier::Agent);
    }
}
