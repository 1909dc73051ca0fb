use crate::entitlement::Entitlement;
use crate::helpers::JsonResponse;
use crate::models::SubscriptionEvent;
use crate::services::SubscriptionStore;
use actix_web::{get, web, Responder, Result};
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// Applied billing events of the caller's tenant, newest first. Mounted
/// behind the feature gate, which leaves the resolved entitlement in the
/// request.
#[tracing::instrument(name = "List subscription events.", skip_all)]
#[get("/subscription/events")]
pub async fn events_handler(
    entitlement: web::ReqData<Entitlement>,
    query: web::Query<EventsQuery>,
    store: web::Data<Arc<dyn SubscriptionStore>>,
) -> Result<impl Responder> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    store
        .list_events(&entitlement.tenant_id, limit)
        .await
        .map(|events| JsonResponse::build().set_list(events).ok("OK"))
        .map_err(|err| {
            tracing::error!("Failed to list events: {}", err);
            JsonResponse::<SubscriptionEvent>::build().internal_server_error("failed to list events")
        })
}
