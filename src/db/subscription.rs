use crate::models;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::Instrument;

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    tenant_id: String,
    plan_id: String,
    status: String,
    trial_end: Option<DateTime<Utc>>,
    past_due_since: Option<DateTime<Utc>>,
    last_event_id: Option<String>,
    last_event_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for models::Subscription {
    type Error = String;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(models::Subscription {
            status: row.status.parse::<models::SubscriptionStatus>()?,
            id: row.id,
            tenant_id: row.tenant_id,
            plan_id: row.plan_id,
            trial_end: row.trial_end,
            past_due_since: row.past_due_since,
            last_event_id: row.last_event_id,
            last_event_at: row.last_event_at,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    event_id: String,
    subscription_id: String,
    tenant_id: String,
    event_type: String,
    status_from: Option<String>,
    status_to: String,
    event_at: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for models::SubscriptionEvent {
    type Error = String;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(models::SubscriptionEvent {
            status_from: row
                .status_from
                .map(|s| s.parse::<models::SubscriptionStatus>())
                .transpose()?,
            status_to: row.status_to.parse::<models::SubscriptionStatus>()?,
            event_id: row.event_id,
            subscription_id: row.subscription_id,
            tenant_id: row.tenant_id,
            event_type: row.event_type,
            event_at: row.event_at,
            recorded_at: row.recorded_at,
        })
    }
}

const SELECT_SUBSCRIPTION: &str = r#"
    SELECT id, tenant_id, plan_id, status, trial_end, past_due_since,
           last_event_id, last_event_at, version, created_at, updated_at
    FROM subscription
"#;

pub async fn fetch(pool: &PgPool, id: &str) -> Result<Option<models::Subscription>, String> {
    let query_span = tracing::info_span!("Fetch subscription by id.", subscription_id = id);
    sqlx::query_as::<_, SubscriptionRow>(&format!("{} WHERE id = $1", SELECT_SUBSCRIPTION))
        .bind(id)
        .fetch_optional(pool)
        .instrument(query_span)
        .await
        .map_err(|err| {
            tracing::error!("Failed to fetch subscription, error: {:?}", err);
            "Could not fetch data".to_string()
        })?
        .map(models::Subscription::try_from)
        .transpose()
}

/// The tenant's current subscription: a live one if any, else the most
/// recently touched.
pub async fn fetch_by_tenant(
    pool: &PgPool,
    tenant_id: &str,
) -> Result<Option<models::Subscription>, String> {
    let query_span = tracing::info_span!("Fetch subscription by tenant.", tenant_id = tenant_id);
    sqlx::query_as::<_, SubscriptionRow>(&format!(
        "{} WHERE tenant_id = $1 ORDER BY (status <> 'canceled') DESC, updated_at DESC LIMIT 1",
        SELECT_SUBSCRIPTION
    ))
    .bind(tenant_id)
    .fetch_optional(pool)
    .instrument(query_span)
    .await
    .map_err(|err| {
        tracing::error!("Failed to fetch subscription by tenant, error: {:?}", err);
        "Could not fetch data".to_string()
    })?
    .map(models::Subscription::try_from)
    .transpose()
}

/// Writes `next` and its history row in one transaction. Returns `false`
/// without writing anything when the stored version is not
/// `expected_version` (`None` meaning the row must not exist yet).
pub async fn save(
    pool: &PgPool,
    expected_version: Option<i64>,
    next: &models::Subscription,
    event: &models::SubscriptionEvent,
) -> Result<bool, String> {
    let query_span = tracing::info_span!(
        "Saving subscription.",
        subscription_id = %next.id,
        version = next.version
    );

    save_in_transaction(pool, expected_version, next, event)
        .instrument(query_span)
        .await
}

async fn save_in_transaction(
    pool: &PgPool,
    expected_version: Option<i64>,
    next: &models::Subscription,
    event: &models::SubscriptionEvent,
) -> Result<bool, String> {
    let mut tx = pool.begin().await.map_err(|err| {
        tracing::error!("Failed to open transaction: {:?}", err);
        "Failed to save".to_string()
    })?;

    let written = match expected_version {
        None => sqlx::query(
            r#"
            INSERT INTO subscription (id, tenant_id, plan_id, status, trial_end, past_due_since,
                last_event_id, last_event_at, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&next.id)
        .bind(&next.tenant_id)
        .bind(&next.plan_id)
        .bind(next.status.as_str())
        .bind(next.trial_end)
        .bind(next.past_due_since)
        .bind(&next.last_event_id)
        .bind(next.last_event_at)
        .bind(next.version)
        .bind(next.created_at)
        .bind(next.updated_at)
        .execute(&mut *tx)
        .await,
        Some(expected) => sqlx::query(
            r#"
            UPDATE subscription
            SET plan_id = $3, status = $4, trial_end = $5, past_due_since = $6,
                last_event_id = $7, last_event_at = $8, version = $9, updated_at = $10
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(&next.id)
        .bind(expected)
        .bind(&next.plan_id)
        .bind(next.status.as_str())
        .bind(next.trial_end)
        .bind(next.past_due_since)
        .bind(&next.last_event_id)
        .bind(next.last_event_at)
        .bind(next.version)
        .bind(next.updated_at)
        .execute(&mut *tx)
        .await,
    }
    .map_err(|err| {
        tracing::error!("Failed to write subscription: {:?}", err);
        "Failed to save".to_string()
    })?
    .rows_affected();

    if written == 0 {
        // dropping the transaction rolls it back
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO subscription_event (event_id, subscription_id, tenant_id, event_type,
            status_from, status_to, event_at, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (event_id) DO NOTHING
        "#,
    )
    .bind(&event.event_id)
    .bind(&event.subscription_id)
    .bind(&event.tenant_id)
    .bind(&event.event_type)
    .bind(event.status_from.map(|s| s.as_str()))
    .bind(event.status_to.as_str())
    .bind(event.event_at)
    .bind(event.recorded_at)
    .execute(&mut *tx)
    .await
    .map_err(|err| {
        tracing::error!("Failed to record subscription event: {:?}", err);
        "Failed to save".to_string()
    })?;

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit subscription: {:?}", err);
        "Failed to save".to_string()
    })?;

    Ok(true)
}

pub async fn event_exists(pool: &PgPool, event_id: &str) -> Result<bool, String> {
    let query_span = tracing::info_span!("Check subscription event.", event_id = event_id);
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM subscription_event WHERE event_id = $1)",
    )
    .bind(event_id)
    .fetch_one(pool)
    .instrument(query_span)
    .await
    .map_err(|err| {
        tracing::error!("Failed to check subscription event, error: {:?}", err);
        "Could not fetch data".to_string()
    })
}

pub async fn fetch_events_by_tenant(
    pool: &PgPool,
    tenant_id: &str,
    limit: i64,
) -> Result<Vec<models::SubscriptionEvent>, String> {
    let query_span = tracing::info_span!("Fetch subscription events by tenant.");
    sqlx::query_as::<_, EventRow>(
        r#"
        SELECT event_id, subscription_id, tenant_id, event_type, status_from, status_to,
               event_at, recorded_at
        FROM subscription_event
        WHERE tenant_id = $1
        ORDER BY event_at DESC
        LIMIT $2
        "#,
    )
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(pool)
    .instrument(query_span)
    .await
    .map_err(|err| {
        tracing::error!("Failed to fetch subscription events, error: {:?}", err);
        "Could not fetch data".to_string()
    })?
    .into_iter()
    .map(models::SubscriptionEvent::try_from)
    .collect()
}
