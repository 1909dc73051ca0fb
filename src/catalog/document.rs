//! On-disk shape of `catalog.yaml`.

use crate::models::{BillingCycle, Tier};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDocument {
    pub version: String,
    pub features: Vec<FeatureEntry>,
    pub tiers: Vec<TierEntry>,
    pub plans: Vec<PlanEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureEntry {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierEntry {
    pub tier: Tier,
    /// When false, `features` is the tier's complete set instead of the
    /// features it adds on top of the tier below.
    #[serde(default = "TierEntry::default_inherit")]
    pub inherit: bool,
    #[serde(default)]
    pub features: Vec<String>,
}

impl TierEntry {
    const fn default_inherit() -> bool {
        true
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanEntry {
    pub id: String,
    pub tier: Tier,
    pub cycle: BillingCycle,
    pub price_cents: i64,
    pub currency: String,
}
