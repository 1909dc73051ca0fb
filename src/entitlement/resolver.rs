use crate::catalog::Catalog;
use crate::configuration::EntitlementSettings;
use crate::models::{Feature, Subscription, SubscriptionStatus, Tier};
use crate::services::store::{StoreError, SubscriptionStore};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NoSubscription,
    UnknownPlan,
    Canceled,
    PastDueGraceExpired,
    TrialExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Access {
    Granted,
    Denied(DenialReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entitlement {
    pub tenant_id: String,
    pub plan_id: Option<String>,
    /// `None` whenever access is denied.
    pub tier: Option<Tier>,
    pub status: Option<SubscriptionStatus>,
    pub features: Vec<Feature>,
    pub access: Access,
    pub computed_at: DateTime<Utc>,
}

impl Entitlement {
    fn denied(
        tenant_id: &str,
        subscription: Option<&Subscription>,
        reason: DenialReason,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            plan_id: subscription.map(|s| s.plan_id.clone()),
            tier: None,
            status: subscription.map(|s| s.status),
            features: Vec::new(),
            access: Access::Denied(reason),
            computed_at: now,
        }
    }

    pub fn none(tenant_id: &str, now: DateTime<Utc>) -> Self {
        Self::denied(tenant_id, None, DenialReason::NoSubscription, now)
    }

    pub fn is_granted(&self) -> bool {
        self.access == Access::Granted
    }

    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self.access {
            Access::Granted => None,
            Access::Denied(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementPolicy {
    pub past_due_grace: Duration,
}

impl Default for EntitlementPolicy {
    fn default() -> Self {
        Self {
            past_due_grace: Duration::days(3),
        }
    }
}

impl From<&EntitlementSettings> for EntitlementPolicy {
    fn from(settings: &EntitlementSettings) -> Self {
        Self {
            past_due_grace: Duration::days(settings.past_due_grace_days.max(0)),
        }
    }
}

/// Computes what `subscription` grants at `now`. Anything ambiguous or
/// lapsed resolves to a denied entitlement with no features.
pub fn resolve(
    subscription: &Subscription,
    catalog: &Catalog,
    policy: &EntitlementPolicy,
    now: DateTime<Utc>,
) -> Entitlement {
    let tenant_id = subscription.tenant_id.as_str();

    let plan = match catalog.resolve_plan(&subscription.plan_id) {
        Ok(plan) => plan,
        Err(err) => {
            tracing::warn!(
                subscription_id = %subscription.id,
                tenant_id = %tenant_id,
                "Denying access: {}",
                err
            );
            return Entitlement::denied(
                tenant_id,
                Some(subscription),
                DenialReason::UnknownPlan,
                now,
            );
        }
    };

    let denial = match subscription.status {
        SubscriptionStatus::Active => None,
        SubscriptionStatus::Trialing => match subscription.trial_end {
            Some(trial_end) if now < trial_end => None,
            _ => Some(DenialReason::TrialExpired),
        },
        SubscriptionStatus::PastDue => {
            // a past_due row without a start is treated as already expired
            let within_grace = subscription
                .past_due_since
                .map_or(false, |since| now < since + policy.past_due_grace);
            if within_grace {
                None
            } else {
                Some(DenialReason::PastDueGraceExpired)
            }
        }
        SubscriptionStatus::Canceled => Some(DenialReason::Canceled),
    };

    if let Some(reason) = denial {
        return Entitlement::denied(tenant_id, Some(subscription), reason, now);
    }

    Entitlement {
        tenant_id: tenant_id.to_string(),
        plan_id: Some(plan.id.clone()),
        tier: Some(plan.tier),
        status: Some(subscription.status),
        features: catalog.features_for_tier(plan.tier).to_vec(),
        access: Access::Granted,
        computed_at: now,
    }
}

/// Store-backed resolution for request handlers.
pub struct EntitlementResolver {
    catalog: Arc<Catalog>,
    store: Arc<dyn SubscriptionStore>,
    policy: EntitlementPolicy,
}

impl EntitlementResolver {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<dyn SubscriptionStore>,
        policy: EntitlementPolicy,
    ) -> Self {
        Self {
            catalog,
            store,
            policy,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[tracing::instrument(name = "Resolve tenant entitlement.", skip(self))]
    pub async fn resolve_for_tenant(&self, tenant_id: &str) -> Result<Entitlement, StoreError> {
        let now = Utc::now();
        let entitlement = match self.store.fetch_by_tenant(tenant_id).await? {
            Some(subscription) => resolve(&subscription, &self.catalog, &self.policy, now),
            None => Entitlement::none(tenant_id, now),
        };
        tracing::debug!(
            tier = ?entitlement.tier,
            access = ?entitlement.access,
            "Entitlement resolved"
        );
        Ok(entitlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::InMemorySubscriptionStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn subscription(plan_id: &str, status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: "sub_1".to_string(),
            tenant_id: "tenant_1".to_string(),
            plan_id: plan_id.to_string(),
            status,
            trial_end: None,
            past_due_since: None,
            last_event_id: None,
            last_event_at: None,
            version: 1,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn catalog() -> Catalog {
        Catalog::builtin().unwrap()
    }

    #[test]
    fn active_subscription_gets_full_tier() {
        let catalog = catalog();
        let entitlement = resolve(
            &subscription("growth_annual", SubscriptionStatus::Active),
            &catalog,
            &EntitlementPolicy::default(),
            now(),
        );
        assert!(entitlement.is_granted());
        assert_eq!(entitlement.tier, Some(Tier::Growth));
        assert_eq!(entitlement.features.len(), 11);
    }

    #[test]
    fn canceled_subscription_has_no_features() {
        let catalog = catalog();
        for plan in catalog.plans() {
            let entitlement = resolve(
                &subscription(&plan.id, SubscriptionStatus::Canceled),
                &catalog,
                &EntitlementPolicy::default(),
                now(),
            );
            assert!(entitlement.features.is_empty());
            assert_eq!(entitlement.tier, None);
            assert_eq!(entitlement.denial_reason(), Some(DenialReason::Canceled));
        }
    }

    #[test]
    fn running_trial_gets_full_tier() {
        let catalog = catalog();
        let mut sub = subscription("enterprise_monthly", SubscriptionStatus::Trialing);
        sub.trial_end = Some(now() + Duration::days(14));

        let entitlement = resolve(&sub, &catalog, &EntitlementPolicy::default(), now());
        assert_eq!(entitlement.features, catalog.features_for_tier(Tier::Enterprise));
        assert_eq!(entitlement.status, Some(SubscriptionStatus::Trialing));
    }

    #[test]
    fn ended_or_open_ended_trial_is_denied() {
        let catalog = catalog();
        let mut sub = subscription("solo_monthly", SubscriptionStatus::Trialing);
        sub.trial_end = Some(now());
        let ended = resolve(&sub, &catalog, &EntitlementPolicy::default(), now());
        assert_eq!(ended.denial_reason(), Some(DenialReason::TrialExpired));

        sub.trial_end = None;
        let open = resolve(&sub, &catalog, &EntitlementPolicy::default(), now());
        assert_eq!(open.denial_reason(), Some(DenialReason::TrialExpired));
    }

    #[test]
    fn past_due_keeps_access_during_grace_only() {
        let catalog = catalog();
        let policy = EntitlementPolicy::default();
        let mut sub = subscription("growth_monthly", SubscriptionStatus::PastDue);

        sub.past_due_since = Some(now() - Duration::days(2));
        assert!(resolve(&sub, &catalog, &policy, now()).is_granted());

        sub.past_due_since = Some(now() - Duration::days(3));
        let lapsed = resolve(&sub, &catalog, &policy, now());
        assert_eq!(lapsed.denial_reason(), Some(DenialReason::PastDueGraceExpired));
        assert!(lapsed.features.is_empty());

        sub.past_due_since = None;
        assert!(!resolve(&sub, &catalog, &policy, now()).is_granted());
    }

    #[test]
    fn unknown_plan_resolves_to_empty_entitlement() {
        let catalog = catalog();
        let entitlement = resolve(
            &subscription("plan_bogus", SubscriptionStatus::Active),
            &catalog,
            &EntitlementPolicy::default(),
            now(),
        );
        assert_eq!(entitlement.denial_reason(), Some(DenialReason::UnknownPlan));
        assert!(entitlement.features.is_empty());
        assert_eq!(entitlement.plan_id.as_deref(), Some("plan_bogus"));
    }

    #[test]
    fn grace_period_follows_settings() {
        let policy = EntitlementPolicy::from(&EntitlementSettings {
            past_due_grace_days: 7,
        });
        assert_eq!(policy.past_due_grace, Duration::days(7));
    }

    #[test]
    fn access_serializes_with_reason() {
        let json = serde_json::to_value(Access::Denied(DenialReason::Canceled)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "denied", "reason": "canceled"}));
        let json = serde_json::to_value(Access::Granted).unwrap();
        assert_eq!(json, serde_json::json!({"state": "granted"}));
    }

    #[tokio::test]
    async fn tenant_without_subscription_is_denied() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        store
            .put(subscription("solo_annual", SubscriptionStatus::Active))
            .await;
        let resolver = EntitlementResolver::new(
            Arc::new(catalog()),
            store,
            EntitlementPolicy::default(),
        );

        let known = resolver.resolve_for_tenant("tenant_1").await.unwrap();
        assert_eq!(known.tier, Some(Tier::Solo));

        let unknown = resolver.resolve_for_tenant("tenant_2").await.unwrap();
        assert_eq!(unknown.denial_reason(), Some(DenialReason::NoSubscription));
        assert!(unknown.features.is_empty());
    }
}
