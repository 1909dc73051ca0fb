use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Whether the billing state machine allows moving from `self` to `next`.
    /// Staying in the same status is always allowed (plan changes, redelivery).
    pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;

        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            (_, Canceled) => true,
            (Trialing, Active) | (Trialing, PastDue) => true,
            (Active, PastDue) => true,
            (PastDue, Active) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trialing" => Ok(Self::Trialing),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            other => Err(format!("unknown subscription status `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub tenant_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub trial_end: Option<DateTime<Utc>>,
    /// Event time at which the subscription entered `past_due`.
    pub past_due_since: Option<DateTime<Utc>>,
    pub last_event_id: Option<String>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One applied billing event, kept as the tenant's subscription history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub event_id: String,
    pub subscription_id: String,
    pub tenant_id: String,
    pub event_type: String,
    pub status_from: Option<SubscriptionStatus>,
    pub status_to: SubscriptionStatus,
    pub event_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}
