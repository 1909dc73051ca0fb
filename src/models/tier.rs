use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription level. The declaration order is the rank order, so the
/// derived `Ord` gives `Solo < Growth < Enterprise < CommunityLeader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Solo,
    Growth,
    Enterprise,
    CommunityLeader,
}

impl Tier {
    /// All tiers, lowest rank first.
    pub const ALL: [Tier; 4] = [
        Tier::Solo,
        Tier::Growth,
        Tier::Enterprise,
        Tier::CommunityLeader,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Growth => "growth",
            Self::Enterprise => "enterprise",
            Self::CommunityLeader => "community_leader",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Solo => "Solo Dealmaker",
            Self::Growth => "Growth Firm",
            Self::Enterprise => "Enterprise",
            Self::CommunityLeader => "Community Leader",
        }
    }

    pub fn rank(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Annual,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
