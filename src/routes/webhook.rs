use crate::configuration::Settings;
use crate::forms;
use crate::helpers::signature::{self, SIGNATURE_HEADER};
use crate::helpers::JsonResponse;
use crate::services::{SubscriptionSync, SyncOutcome};
use crate::subscription::BillingEvent;
use actix_web::{post, web, HttpRequest, Responder, Result};
use chrono::Utc;
use serde_valid::Validate;

/// Receives billing provider events. Anything the provider should not
/// retry is acknowledged with 200, including duplicates, stale events and
/// event types this service does not handle.
#[tracing::instrument(name = "Billing webhook.", skip_all)]
#[post("/billing")]
pub async fn billing_handler(
    req: HttpRequest,
    body: web::Bytes,
    settings: web::Data<Settings>,
    sync: web::Data<SubscriptionSync>,
) -> Result<impl Responder> {
    let header = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    signature::verify(
        header,
        &body,
        settings.webhook.secret.as_bytes(),
        settings.webhook.tolerance_secs,
        Utc::now(),
    )
    .map_err(|err| {
        tracing::warn!("Rejected webhook: {}", err);
        JsonResponse::<SyncOutcome>::build().bad_request(err.to_string())
    })?;

    let form = serde_json::from_slice::<forms::WebhookEvent>(&body).map_err(|err| {
        tracing::warn!("Malformed webhook payload: {}", err);
        JsonResponse::<SyncOutcome>::build().bad_request(format!("malformed event: {err}"))
    })?;
    form.validate().map_err(|err| {
        JsonResponse::<SyncOutcome>::build().bad_request(format!("invalid event: {err}"))
    })?;

    let event_id = form.id.clone();
    let event_type = form.event_type.clone();
    let event = match BillingEvent::from_form(form) {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::info!(event_id = %event_id, "Ignoring unhandled event type {}", event_type);
            let outcome = SyncOutcome::Ignored {
                reason: format!("unhandled event type `{event_type}`"),
            };
            return Ok(JsonResponse::build().set_item(outcome).ok("ignored"));
        }
        Err(err) => {
            tracing::warn!(event_id = %event_id, "Unusable event: {}", err);
            return Err(JsonResponse::<SyncOutcome>::build().bad_request(err.to_string()));
        }
    };

    sync.handle(&event)
        .await
        .map(|outcome| JsonResponse::build().set_id(event_id).set_item(outcome).ok("OK"))
        .map_err(|err| {
            tracing::error!("Failed to apply event: {}", err);
            JsonResponse::<SyncOutcome>::build().internal_server_error("failed to apply event")
        })
}
