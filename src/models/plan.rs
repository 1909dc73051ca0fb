use crate::models::{BillingCycle, Tier};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub tier: Tier,
    pub cycle: BillingCycle,
    /// Price in minor currency units.
    pub price_cents: i64,
    pub currency: String,
}
