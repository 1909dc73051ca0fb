use super::resolver::{DenialReason, Entitlement};
use crate::catalog::Catalog;
use crate::models::{SubscriptionStatus, Tier};
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

/// True only for a granted entitlement that carries `feature_key`.
pub fn has_feature(entitlement: &Entitlement, feature_key: &str) -> bool {
    entitlement.is_granted()
        && entitlement
            .features
            .iter()
            .any(|feature| feature.key == feature_key)
}

/// Rejection payload telling the caller which tier unlocks the feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpgradeRequired {
    pub error: &'static str,
    pub feature: String,
    pub feature_label: Option<String>,
    /// `None` when the feature is not in the catalog at all.
    pub required_tier: Option<Tier>,
    pub current_tier: Option<Tier>,
    pub status: Option<SubscriptionStatus>,
    pub reason: Option<DenialReason>,
}

impl fmt::Display for UpgradeRequired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.required_tier {
            Some(tier) => write!(f, "feature `{}` requires the {} tier", self.feature, tier.label()),
            None => write!(f, "feature `{}` is not offered by any plan", self.feature),
        }
    }
}

impl std::error::Error for UpgradeRequired {}

impl ResponseError for UpgradeRequired {
    fn status_code(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

pub fn require_feature(
    entitlement: &Entitlement,
    feature_key: &str,
    catalog: &Catalog,
) -> Result<(), UpgradeRequired> {
    if has_feature(entitlement, feature_key) {
        return Ok(());
    }

    tracing::info!(
        tenant_id = %entitlement.tenant_id,
        feature = feature_key,
        access = ?entitlement.access,
        "Feature access denied"
    );

    Err(UpgradeRequired {
        error: "upgrade_required",
        feature: feature_key.to_string(),
        feature_label: catalog.feature(feature_key).map(|f| f.label.clone()),
        required_tier: catalog.minimum_tier_for(feature_key),
        current_tier: entitlement.tier,
        status: entitlement.status,
        reason: entitlement.denial_reason(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlement::{resolve, EntitlementPolicy};
    use crate::models::Subscription;
    use chrono::{TimeZone, Utc};

    fn entitlement(catalog: &Catalog, plan_id: &str, status: SubscriptionStatus) -> Entitlement {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let subscription = Subscription {
            id: "sub_1".to_string(),
            tenant_id: "tenant_1".to_string(),
            plan_id: plan_id.to_string(),
            status,
            trial_end: None,
            past_due_since: None,
            last_event_id: None,
            last_event_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        resolve(&subscription, catalog, &EntitlementPolicy::default(), now)
    }

    #[test]
    fn tier_features_are_allowed() {
        let catalog = Catalog::builtin().unwrap();
        let growth = entitlement(&catalog, "growth_monthly", SubscriptionStatus::Active);
        assert!(has_feature(&growth, "deal_pipeline"));
        assert!(has_feature(&growth, "virtual_data_room"));
        assert!(require_feature(&growth, "deal_matching", &catalog).is_ok());
    }

    #[test]
    fn higher_tier_feature_names_the_upgrade() {
        let catalog = Catalog::builtin().unwrap();
        let growth = entitlement(&catalog, "growth_monthly", SubscriptionStatus::Active);

        let err = require_feature(&growth, "api_access", &catalog).unwrap_err();
        assert_eq!(err.required_tier, Some(Tier::Enterprise));
        assert_eq!(err.current_tier, Some(Tier::Growth));
        assert_eq!(err.feature_label.as_deref(), Some("API access"));
        assert_eq!(err.reason, None);
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn denied_entitlement_fails_every_feature() {
        let catalog = Catalog::builtin().unwrap();
        let canceled = entitlement(&catalog, "community_leader_annual", SubscriptionStatus::Canceled);
        assert!(!has_feature(&canceled, "deal_pipeline"));

        let err = require_feature(&canceled, "deal_pipeline", &catalog).unwrap_err();
        assert_eq!(err.required_tier, Some(Tier::Solo));
        assert_eq!(err.current_tier, None);
        assert_eq!(err.reason, Some(DenialReason::Canceled));
        assert_eq!(err.status, Some(SubscriptionStatus::Canceled));
    }

    #[test]
    fn unknown_feature_is_denied() {
        let catalog = Catalog::builtin().unwrap();
        let leader = entitlement(&catalog, "community_leader_monthly", SubscriptionStatus::Active);
        let err = require_feature(&leader, "time_travel", &catalog).unwrap_err();
        assert_eq!(err.required_tier, None);
        assert_eq!(err.feature_label, None);
        assert_eq!(err.to_string(), "feature `time_travel` is not offered by any plan");
    }

    #[test]
    fn payload_shape() {
        let catalog = Catalog::builtin().unwrap();
        let solo = entitlement(&catalog, "solo_monthly", SubscriptionStatus::Active);
        let err = require_feature(&solo, "sso", &catalog).unwrap_err();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"], "upgrade_required");
        assert_eq!(json["feature"], "sso");
        assert_eq!(json["required_tier"], "enterprise");
        assert_eq!(json["current_tier"], "solo");
        assert_eq!(json["status"], "active");
        assert!(json["reason"].is_null());
    }
}
