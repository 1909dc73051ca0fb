use super::{StoreError, SubscriptionStore};
use crate::models::{Subscription, SubscriptionEvent, SubscriptionStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store used by tests and the console.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    subscriptions: HashMap<String, Subscription>,
    events: Vec<SubscriptionEvent>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a subscription without the version check.
    pub async fn put(&self, subscription: Subscription) {
        self.state
            .write()
            .await
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn fetch(&self, subscription_id: &str) -> Result<Option<Subscription>, StoreError> {
        Ok(self.state.read().await.subscriptions.get(subscription_id).cloned())
    }

    async fn fetch_by_tenant(&self, tenant_id: &str) -> Result<Option<Subscription>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .values()
            .filter(|subscription| subscription.tenant_id == tenant_id)
            .max_by_key(|subscription| {
                (
                    subscription.status != SubscriptionStatus::Canceled,
                    subscription.updated_at,
                )
            })
            .cloned())
    }

    async fn compare_and_swap(
        &self,
        expected_version: Option<i64>,
        next: &Subscription,
        event: &SubscriptionEvent,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let current = state.subscriptions.get(&next.id).map(|s| s.version);
        if current != expected_version {
            return Err(StoreError::VersionConflict(next.id.clone()));
        }

        state.subscriptions.insert(next.id.clone(), next.clone());
        if !state.events.iter().any(|e| e.event_id == event.event_id) {
            state.events.push(event.clone());
        }
        Ok(())
    }

    async fn has_event(&self, event_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .events
            .iter()
            .any(|event| event.event_id == event_id))
    }

    async fn list_events(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<SubscriptionEvent>, StoreError> {
        let state = self.state.read().await;
        let mut events: Vec<SubscriptionEvent> = state
            .events
            .iter()
            .filter(|event| event.tenant_id == tenant_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.event_at.cmp(&a.event_at));
        events.truncate(limit);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn subscription(id: &str, status: SubscriptionStatus, version: i64) -> Subscription {
        let at = Utc.timestamp_opt(1_700_000_000 + version, 0).unwrap();
        Subscription {
            id: id.to_string(),
            tenant_id: "tenant".to_string(),
            plan_id: "solo_monthly".to_string(),
            status,
            trial_end: None,
            past_due_since: None,
            last_event_id: None,
            last_event_at: None,
            version,
            created_at: at,
            updated_at: at,
        }
    }

    fn event(id: &str, subscription_id: &str) -> SubscriptionEvent {
        SubscriptionEvent {
            event_id: id.to_string(),
            subscription_id: subscription_id.to_string(),
            tenant_id: "tenant".to_string(),
            event_type: "subscription.created".to_string(),
            status_from: None,
            status_to: SubscriptionStatus::Active,
            event_at: Utc::now(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn has_event_sees_every_recorded_event() {
        let store = InMemorySubscriptionStore::new();
        let first = subscription("sub_1", SubscriptionStatus::Active, 1);
        store.compare_and_swap(None, &first, &event("evt_1", "sub_1")).await.unwrap();
        let second = subscription("sub_1", SubscriptionStatus::PastDue, 2);
        store.compare_and_swap(Some(1), &second, &event("evt_2", "sub_1")).await.unwrap();

        assert!(store.has_event("evt_1").await.unwrap());
        assert!(store.has_event("evt_2").await.unwrap());
        assert!(!store.has_event("evt_3").await.unwrap());
    }

    #[tokio::test]
    async fn insert_requires_absent_row() {
        let store = InMemorySubscriptionStore::new();
        let sub = subscription("sub_1", SubscriptionStatus::Active, 1);
        store.compare_and_swap(None, &sub, &event("evt_1", "sub_1")).await.unwrap();

        let again = store.compare_and_swap(None, &sub, &event("evt_2", "sub_1")).await;
        assert!(matches!(again, Err(StoreError::VersionConflict(_))));
    }

    #[tokio::test]
    async fn update_requires_matching_version() {
        let store = InMemorySubscriptionStore::new();
        store.put(subscription("sub_1", SubscriptionStatus::Active, 3)).await;

        let next = subscription("sub_1", SubscriptionStatus::PastDue, 4);
        let stale = store.compare_and_swap(Some(2), &next, &event("evt_1", "sub_1")).await;
        assert!(matches!(stale, Err(StoreError::VersionConflict(_))));

        store.compare_and_swap(Some(3), &next, &event("evt_1", "sub_1")).await.unwrap();
        let stored = store.fetch("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::PastDue);
        assert_eq!(stored.version, 4);
    }

    #[tokio::test]
    async fn tenant_lookup_prefers_live_subscription() {
        let store = InMemorySubscriptionStore::new();
        store.put(subscription("sub_old", SubscriptionStatus::Active, 1)).await;
        store.put(subscription("sub_new", SubscriptionStatus::Canceled, 9)).await;

        let found = store.fetch_by_tenant("tenant").await.unwrap().unwrap();
        assert_eq!(found.id, "sub_old");
        assert!(store.fetch_by_tenant("nobody").await.unwrap().is_none());
    }
}
