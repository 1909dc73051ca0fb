use crate::catalog::Catalog;
use crate::configuration::{get_configuration, EntitlementSettings};
use crate::entitlement::{resolve, EntitlementPolicy};
use crate::models::{Subscription, SubscriptionStatus};
use chrono::{DateTime, Utc};

/// Prints what a subscription on `plan` in `status` would be entitled to now.
pub struct ResolveCommand {
    plan: String,
    status: String,
    trial_end: Option<String>,
    past_due_since: Option<String>,
    grace_days: Option<i64>,
    file: Option<String>,
}

impl ResolveCommand {
    pub fn new(
        plan: String,
        status: String,
        trial_end: Option<String>,
        past_due_since: Option<String>,
        grace_days: Option<i64>,
        file: Option<String>,
    ) -> Self {
        Self {
            plan,
            status,
            trial_end,
            past_due_since,
            grace_days,
            file,
        }
    }
}

fn parse_time(value: Option<&str>) -> Result<Option<DateTime<Utc>>, Box<dyn std::error::Error>> {
    match value {
        Some(value) => Ok(Some(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))),
        None => Ok(None),
    }
}

/// An explicit `--grace-days` wins; otherwise the server's configured grace
/// period, or the built-in default when no configuration can be loaded.
fn policy(grace_days: Option<i64>) -> EntitlementPolicy {
    match grace_days {
        Some(past_due_grace_days) => EntitlementPolicy::from(&EntitlementSettings { past_due_grace_days }),
        None => match get_configuration() {
            Ok(settings) => EntitlementPolicy::from(&settings.entitlement),
            Err(err) => {
                tracing::debug!("no configuration, using default grace period: {}", err);
                EntitlementPolicy::default()
            }
        },
    }
}

impl crate::console::commands::CallableTrait for ResolveCommand {
    fn call(&self) -> Result<(), Box<dyn std::error::Error>> {
        let catalog = Catalog::load(self.file.as_deref())?;
        let status: SubscriptionStatus = self.status.parse()?;
        let now = Utc::now();

        let subscription = Subscription {
            id: "console".to_string(),
            tenant_id: "console".to_string(),
            plan_id: self.plan.clone(),
            status,
            trial_end: parse_time(self.trial_end.as_deref())?,
            past_due_since: parse_time(self.past_due_since.as_deref())?,
            last_event_id: None,
            last_event_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let entitlement = resolve(&subscription, &catalog, &policy(self.grace_days), now);
        println!("{}", serde_json::to_string_pretty(&entitlement)?);
        Ok(())
    }
}
