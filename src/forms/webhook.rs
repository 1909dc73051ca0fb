use serde::Deserialize;
use serde_valid::Validate;

/// Envelope of every billing provider webhook.
#[derive(Debug, Deserialize, Validate)]
pub struct WebhookEvent {
    #[validate(min_length = 1)]
    #[validate(max_length = 255)]
    pub id: String,
    #[serde(rename = "type")]
    #[validate(min_length = 1)]
    pub event_type: String,
    /// Unix seconds at which the provider created the event.
    #[validate(minimum = 0)]
    pub created: i64,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscriptionObject {
    #[validate(min_length = 1)]
    #[validate(max_length = 255)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub trial_end: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InvoiceObject {
    #[validate(min_length = 1)]
    #[validate(max_length = 255)]
    pub subscription: String,
}
