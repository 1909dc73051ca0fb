//! Subscription persistence.
//!
//! Every write goes through `compare_and_swap`, which only succeeds when
//! the stored row still carries the version the caller read. Concurrent
//! webhook deliveries for one subscription therefore serialize: the loser
//! sees `VersionConflict`, reloads, and re-applies its event on top of the
//! winner's state.

mod memory;

pub use memory::InMemorySubscriptionStore;

use crate::db;
use crate::models::{Subscription, SubscriptionEvent};
use async_trait::async_trait;
use sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("subscription {0} was modified concurrently")]
    VersionConflict(String),
    #[error("storage failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn fetch(&self, subscription_id: &str) -> Result<Option<Subscription>, StoreError>;

    /// The tenant's live subscription, or its most recent one when every
    /// subscription it ever had is canceled.
    async fn fetch_by_tenant(&self, tenant_id: &str) -> Result<Option<Subscription>, StoreError>;

    /// Stores `next` and appends `event` to the history, provided the
    /// current version equals `expected_version` (`None`: no row yet).
    async fn compare_and_swap(
        &self,
        expected_version: Option<i64>,
        next: &Subscription,
        event: &SubscriptionEvent,
    ) -> Result<(), StoreError>;

    /// Whether `event_id` is already in the history. The last applied event
    /// alone cannot tell an old redelivery apart from a new event sharing
    /// its timestamp.
    async fn has_event(&self, event_id: &str) -> Result<bool, StoreError>;

    /// Newest first.
    async fn list_events(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<SubscriptionEvent>, StoreError>;
}

pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn fetch(&self, subscription_id: &str) -> Result<Option<Subscription>, StoreError> {
        db::subscription::fetch(&self.pool, subscription_id)
            .await
            .map_err(StoreError::Backend)
    }

    async fn fetch_by_tenant(&self, tenant_id: &str) -> Result<Option<Subscription>, StoreError> {
        db::subscription::fetch_by_tenant(&self.pool, tenant_id)
            .await
            .map_err(StoreError::Backend)
    }

    async fn compare_and_swap(
        &self,
        expected_version: Option<i64>,
        next: &Subscription,
        event: &SubscriptionEvent,
    ) -> Result<(), StoreError> {
        match db::subscription::save(&self.pool, expected_version, next, event).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(StoreError::VersionConflict(next.id.clone())),
            Err(err) => Err(StoreError::Backend(err)),
        }
    }

    async fn has_event(&self, event_id: &str) -> Result<bool, StoreError> {
        db::subscription::event_exists(&self.pool, event_id)
            .await
            .map_err(StoreError::Backend)
    }

    async fn list_events(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> Result<Vec<SubscriptionEvent>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        db::subscription::fetch_events_by_tenant(&self.pool, tenant_id, limit)
            .await
            .map_err(StoreError::Backend)
    }
}
