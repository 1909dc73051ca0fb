//! Applies verified billing events to stored subscriptions.

use crate::models::SubscriptionStatus;
use crate::services::store::{StoreError, SubscriptionStore};
use crate::subscription::{apply, BillingEvent, TransitionError};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Reload-and-reapply rounds before a contended write is given up on.
const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Applied {
        subscription_id: String,
        status: SubscriptionStatus,
    },
    Duplicate,
    Stale,
    /// Acknowledged but not applied; redelivery would not change that.
    Ignored { reason: String },
}

pub struct SubscriptionSync {
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionSync {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(
        name = "Sync subscription from billing event.",
        skip(self, event),
        fields(event_id = %event.id, event_type = event.kind.as_str(), subscription_id = %event.subscription_id)
    )]
    pub async fn handle(&self, event: &BillingEvent) -> Result<SyncOutcome, StoreError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let current = self.store.fetch(&event.subscription_id).await?;
            // checked after the load: a concurrent writer recording this event
            // also bumps the version, so the swap below would fail and retry
            if self.store.has_event(&event.id).await? {
                tracing::info!("event {} was already applied", event.id);
                return Ok(SyncOutcome::Duplicate);
            }

            let transition = match apply(current.as_ref(), event, Utc::now()) {
                Ok(transition) => transition,
                Err(err) => return Ok(Self::rejected(err)),
            };

            let expected_version = current.as_ref().map(|s| s.version);
            match self
                .store
                .compare_and_swap(expected_version, &transition.subscription, &transition.record)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        status_from = ?transition.record.status_from,
                        status_to = %transition.subscription.status,
                        version = transition.subscription.version,
                        "Subscription updated"
                    );
                    return Ok(SyncOutcome::Applied {
                        subscription_id: transition.subscription.id,
                        status: transition.subscription.status,
                    });
                }
                Err(StoreError::VersionConflict(_)) => {
                    tracing::debug!(attempt, "Concurrent update, retrying");
                }
                Err(err) => return Err(err),
            }
        }

        tracing::error!("Gave up after {} conflicting attempts", MAX_ATTEMPTS);
        Err(StoreError::VersionConflict(event.subscription_id.clone()))
    }

    fn rejected(err: TransitionError) -> SyncOutcome {
        match err {
            TransitionError::Duplicate { .. } => {
                tracing::info!("{}", err);
                SyncOutcome::Duplicate
            }
            TransitionError::StaleEventIgnored { .. } => {
                tracing::info!("{}", err);
                SyncOutcome::Stale
            }
            TransitionError::InvalidTransition { .. }
            | TransitionError::UnknownSubscription(_)
            | TransitionError::MissingField { .. } => {
                tracing::warn!("{}", err);
                SyncOutcome::Ignored {
                    reason: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Subscription, SubscriptionEvent};
    use crate::services::store::InMemorySubscriptionStore;
    use crate::subscription::{EventKind, SubscriptionSnapshot};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(offset_secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
    }

    fn event(id: &str, kind: EventKind, created: DateTime<Utc>, status: Option<SubscriptionStatus>) -> BillingEvent {
        BillingEvent {
            id: id.to_string(),
            kind,
            created,
            subscription_id: "sub_1".to_string(),
            snapshot: SubscriptionSnapshot {
                tenant_id: Some("tenant_1".to_string()),
                plan_id: Some("growth_monthly".to_string()),
                status,
                trial_end: None,
            },
        }
    }

    #[tokio::test]
    async fn creates_then_updates() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sync = SubscriptionSync::new(store.clone());

        let created = event("evt_1", EventKind::SubscriptionCreated, at(0), Some(SubscriptionStatus::Active));
        assert_eq!(
            sync.handle(&created).await.unwrap(),
            SyncOutcome::Applied {
                subscription_id: "sub_1".to_string(),
                status: SubscriptionStatus::Active
            }
        );

        let failed = event("evt_2", EventKind::PaymentFailed, at(60), None);
        sync.handle(&failed).await.unwrap();

        let stored = store.fetch("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::PastDue);
        assert_eq!(stored.past_due_since, Some(at(60)));
        assert_eq!(stored.version, 2);
        assert_eq!(store.list_events("tenant_1", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn redelivery_is_a_noop() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sync = SubscriptionSync::new(store.clone());
        let created = event("evt_1", EventKind::SubscriptionCreated, at(0), Some(SubscriptionStatus::Active));

        sync.handle(&created).await.unwrap();
        assert_eq!(sync.handle(&created).await.unwrap(), SyncOutcome::Duplicate);
        assert_eq!(store.fetch("sub_1").await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn same_second_redelivery_of_earlier_event_is_a_noop() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sync = SubscriptionSync::new(store.clone());
        sync.handle(&event("evt_0", EventKind::SubscriptionCreated, at(0), Some(SubscriptionStatus::Active)))
            .await
            .unwrap();
        let failed = event("evt_1", EventKind::PaymentFailed, at(10), None);
        sync.handle(&failed).await.unwrap();
        sync.handle(&event("evt_2", EventKind::PaymentSucceeded, at(10), None))
            .await
            .unwrap();

        assert_eq!(sync.handle(&failed).await.unwrap(), SyncOutcome::Duplicate);
        let stored = store.fetch("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.last_event_id.as_deref(), Some("evt_2"));
        assert_eq!(stored.version, 3);
    }

    #[tokio::test]
    async fn older_event_after_newer_is_stale() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sync = SubscriptionSync::new(store.clone());

        sync.handle(&event("evt_0", EventKind::SubscriptionCreated, at(0), Some(SubscriptionStatus::Active)))
            .await
            .unwrap();
        sync.handle(&event("evt_2", EventKind::SubscriptionDeleted, at(120), None))
            .await
            .unwrap();
        let outcome = sync
            .handle(&event("evt_1", EventKind::SubscriptionUpdated, at(60), Some(SubscriptionStatus::Active)))
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Stale);
        let stored = store.fetch("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn invoice_for_unknown_subscription_is_ignored() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sync = SubscriptionSync::new(store.clone());
        let outcome = sync
            .handle(&event("evt_1", EventKind::PaymentSucceeded, at(0), None))
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Ignored { .. }));
        assert!(store.fetch("sub_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_deliveries_all_land() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sync = Arc::new(SubscriptionSync::new(store.clone()));
        sync.handle(&event("evt_0", EventKind::SubscriptionCreated, at(0), Some(SubscriptionStatus::Active)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 1..=4 {
            let sync = sync.clone();
            let kind = if i % 2 == 0 { EventKind::PaymentSucceeded } else { EventKind::PaymentFailed };
            let evt = event(&format!("evt_{i}"), kind, at(i * 10), None);
            handles.push(tokio::spawn(async move { sync.handle(&evt).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.fetch("sub_1").await.unwrap().unwrap();
        assert!(stored.version >= 2);
        assert!(stored.last_event_at.is_some());
    }

    /// Store whose writes always lose the race.
    struct Contended {
        inner: InMemorySubscriptionStore,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl SubscriptionStore for Contended {
        async fn fetch(&self, id: &str) -> Result<Option<Subscription>, StoreError> {
            self.inner.fetch(id).await
        }

        async fn fetch_by_tenant(&self, tenant_id: &str) -> Result<Option<Subscription>, StoreError> {
            self.inner.fetch_by_tenant(tenant_id).await
        }

        async fn compare_and_swap(
            &self,
            _expected_version: Option<i64>,
            next: &Subscription,
            _event: &SubscriptionEvent,
        ) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::VersionConflict(next.id.clone()))
        }

        async fn has_event(&self, event_id: &str) -> Result<bool, StoreError> {
            self.inner.has_event(event_id).await
        }

        async fn list_events(&self, tenant_id: &str, limit: usize) -> Result<Vec<SubscriptionEvent>, StoreError> {
            self.inner.list_events(tenant_id, limit).await
        }
    }

    #[tokio::test]
    async fn gives_up_after_bounded_retries() {
        let store = Arc::new(Contended {
            inner: InMemorySubscriptionStore::new(),
            writes: AtomicUsize::new(0),
        });
        let sync = SubscriptionSync::new(store.clone());
        let mut created = event("evt_1", EventKind::SubscriptionCreated, at(0), None);
        created.snapshot.trial_end = Some(at(0) + Duration::days(14));

        let result = sync.handle(&created).await;
        assert!(matches!(result, Err(StoreError::VersionConflict(_))));
        assert_eq!(store.writes.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
