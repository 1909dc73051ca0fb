use crate::forms;
use crate::models::SubscriptionStatus;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_valid::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    TrialWillEnd,
    PaymentSucceeded,
    PaymentFailed,
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Option<Self> {
        match event_type {
            "subscription.created" => Some(Self::SubscriptionCreated),
            "subscription.updated" => Some(Self::SubscriptionUpdated),
            "subscription.deleted" => Some(Self::SubscriptionDeleted),
            "subscription.trial_will_end" => Some(Self::TrialWillEnd),
            "invoice.payment_succeeded" => Some(Self::PaymentSucceeded),
            "invoice.payment_failed" => Some(Self::PaymentFailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubscriptionCreated => "subscription.created",
            Self::SubscriptionUpdated => "subscription.updated",
            Self::SubscriptionDeleted => "subscription.deleted",
            Self::TrialWillEnd => "subscription.trial_will_end",
            Self::PaymentSucceeded => "invoice.payment_succeeded",
            Self::PaymentFailed => "invoice.payment_failed",
        }
    }

    fn carries_subscription(&self) -> bool {
        !matches!(self, Self::PaymentSucceeded | Self::PaymentFailed)
    }
}

/// Subscription fields as reported by the provider. Absent fields leave the
/// stored values untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionSnapshot {
    pub tenant_id: Option<String>,
    pub plan_id: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub trial_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillingEvent {
    pub id: String,
    pub kind: EventKind,
    pub created: DateTime<Utc>,
    pub subscription_id: String,
    pub snapshot: SubscriptionSnapshot,
}

#[derive(Debug, thiserror::Error)]
pub enum EventParseError {
    #[error("invalid event: {0}")]
    Invalid(String),
    #[error("unknown subscription status `{0}`")]
    UnknownStatus(String),
    #[error("timestamp {0} is out of range")]
    Timestamp(i64),
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, EventParseError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(EventParseError::Timestamp(secs))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl BillingEvent {
    /// `Ok(None)` for event types this service does not act on.
    pub fn from_form(form: forms::WebhookEvent) -> Result<Option<Self>, EventParseError> {
        let kind = match EventKind::from_type(&form.event_type) {
            Some(kind) => kind,
            None => return Ok(None),
        };
        let created = timestamp(form.created)?;

        let (subscription_id, snapshot) = if kind.carries_subscription() {
            let object: forms::SubscriptionObject = serde_json::from_value(form.data.object)
                .map_err(|err| EventParseError::Invalid(err.to_string()))?;
            object
                .validate()
                .map_err(|err| EventParseError::Invalid(err.to_string()))?;

            let status = match non_empty(object.status) {
                Some(status) => Some(
                    status
                        .parse::<SubscriptionStatus>()
                        .map_err(|_| EventParseError::UnknownStatus(status))?,
                ),
                None => None,
            };
            let trial_end = object.trial_end.map(timestamp).transpose()?;

            (
                object.id,
                SubscriptionSnapshot {
                    tenant_id: non_empty(object.tenant_id),
                    plan_id: non_empty(object.plan_id),
                    status,
                    trial_end,
                },
            )
        } else {
            let object: forms::InvoiceObject = serde_json::from_value(form.data.object)
                .map_err(|err| EventParseError::Invalid(err.to_string()))?;
            object
                .validate()
                .map_err(|err| EventParseError::Invalid(err.to_string()))?;
            (object.subscription, SubscriptionSnapshot::default())
        };

        Ok(Some(Self {
            id: form.id,
            kind,
            created,
            subscription_id,
            snapshot,
        }))
    }
}
