//! Billing state machine.
//!
//! `apply` is a pure function from (stored subscription, event) to the next
//! stored subscription. Ordering is decided by the provider's event time:
//! an event older than the last applied one is stale no matter when it
//! arrives, and an event already applied is a no-op.

use super::event::{BillingEvent, EventKind};
use crate::models::{Subscription, SubscriptionEvent, SubscriptionStatus};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("event {event_id} was already applied")]
    Duplicate { event_id: String },
    #[error(
        "stale event {event_id} ignored: it happened at {event_at}, the subscription last changed at {last_event_at}"
    )]
    StaleEventIgnored {
        event_id: String,
        event_at: DateTime<Utc>,
        last_event_at: DateTime<Utc>,
    },
    #[error("subscription {subscription_id} cannot move from {from} to {to}")]
    InvalidTransition {
        subscription_id: String,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    },
    #[error("subscription {0} is not known")]
    UnknownSubscription(String),
    #[error("event {event_id} does not carry `{field}`")]
    MissingField {
        event_id: String,
        field: &'static str,
    },
}

/// The next stored state plus its history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub subscription: Subscription,
    pub record: SubscriptionEvent,
}

pub fn apply(
    current: Option<&Subscription>,
    event: &BillingEvent,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    let subscription = match current {
        None => create(event, now)?,
        Some(current) => advance(current, event, now)?,
    };

    let record = SubscriptionEvent {
        event_id: event.id.clone(),
        subscription_id: subscription.id.clone(),
        tenant_id: subscription.tenant_id.clone(),
        event_type: event.kind.as_str().to_string(),
        status_from: current.map(|c| c.status),
        status_to: subscription.status,
        event_at: event.created,
        recorded_at: now,
    };

    Ok(Transition {
        subscription,
        record,
    })
}

fn required<'a>(
    event: &BillingEvent,
    value: Option<&'a String>,
    field: &'static str,
) -> Result<&'a String, TransitionError> {
    value.ok_or_else(|| TransitionError::MissingField {
        event_id: event.id.clone(),
        field,
    })
}

fn create(event: &BillingEvent, now: DateTime<Utc>) -> Result<Subscription, TransitionError> {
    let snapshot = &event.snapshot;
    let status = match event.kind {
        EventKind::SubscriptionCreated => match snapshot.status {
            Some(status) => status,
            None if snapshot.trial_end.map_or(false, |end| end > event.created) => {
                SubscriptionStatus::Trialing
            }
            None => SubscriptionStatus::Active,
        },
        EventKind::SubscriptionDeleted => SubscriptionStatus::Canceled,
        EventKind::SubscriptionUpdated => snapshot.status.ok_or_else(|| {
            TransitionError::MissingField {
                event_id: event.id.clone(),
                field: "status",
            }
        })?,
        EventKind::TrialWillEnd | EventKind::PaymentSucceeded | EventKind::PaymentFailed => {
            return Err(TransitionError::UnknownSubscription(
                event.subscription_id.clone(),
            ))
        }
    };

    let tenant_id = required(event, snapshot.tenant_id.as_ref(), "tenant_id")?;
    let plan_id = required(event, snapshot.plan_id.as_ref(), "plan_id")?;

    Ok(Subscription {
        id: event.subscription_id.clone(),
        tenant_id: tenant_id.clone(),
        plan_id: plan_id.clone(),
        status,
        trial_end: snapshot.trial_end,
        past_due_since: (status == SubscriptionStatus::PastDue).then_some(event.created),
        last_event_id: Some(event.id.clone()),
        last_event_at: Some(event.created),
        version: 1,
        created_at: now,
        updated_at: now,
    })
}

fn advance(
    current: &Subscription,
    event: &BillingEvent,
    now: DateTime<Utc>,
) -> Result<Subscription, TransitionError> {
    if current.last_event_id.as_deref() == Some(event.id.as_str()) {
        return Err(TransitionError::Duplicate {
            event_id: event.id.clone(),
        });
    }
    if let Some(last_event_at) = current.last_event_at {
        if event.created < last_event_at {
            return Err(TransitionError::StaleEventIgnored {
                event_id: event.id.clone(),
                event_at: event.created,
                last_event_at,
            });
        }
    }

    let snapshot = &event.snapshot;
    let target = match event.kind {
        EventKind::SubscriptionCreated | EventKind::SubscriptionUpdated => {
            snapshot.status.unwrap_or(current.status)
        }
        EventKind::SubscriptionDeleted => SubscriptionStatus::Canceled,
        EventKind::TrialWillEnd => current.status,
        EventKind::PaymentSucceeded => SubscriptionStatus::Active,
        EventKind::PaymentFailed => SubscriptionStatus::PastDue,
    };

    if !current.status.can_transition_to(target) {
        return Err(TransitionError::InvalidTransition {
            subscription_id: current.id.clone(),
            from: current.status,
            to: target,
        });
    }

    if let Some(tenant_id) = snapshot.tenant_id.as_deref() {
        if tenant_id != current.tenant_id {
            tracing::warn!(
                subscription_id = %current.id,
                stored_tenant = %current.tenant_id,
                event_tenant = %tenant_id,
                "Event names a different tenant; keeping the stored owner"
            );
        }
    }

    let past_due_since = match (current.status, target) {
        (SubscriptionStatus::PastDue, SubscriptionStatus::PastDue) => {
            current.past_due_since.or(Some(event.created))
        }
        (_, SubscriptionStatus::PastDue) => Some(event.created),
        _ => None,
    };

    let mut next = current.clone();
    next.status = target;
    if let Some(plan_id) = snapshot.plan_id.as_ref() {
        next.plan_id = plan_id.clone();
    }
    if snapshot.trial_end.is_some() {
        next.trial_end = snapshot.trial_end;
    }
    next.past_due_since = past_due_since;
    next.last_event_id = Some(event.id.clone());
    next.last_event_at = Some(event.created);
    next.version = current.version + 1;
    next.updated_at = now;
    Ok(next)
}
