use crate::entitlement::{Entitlement, EntitlementResolver};
use crate::helpers::{self, JsonResponse};
use actix_web::{get, web, HttpRequest, Responder, Result};

#[tracing::instrument(name = "Get tenant entitlement.", skip_all)]
#[get("/entitlement")]
pub async fn entitlement_handler(
    req: HttpRequest,
    resolver: web::Data<EntitlementResolver>,
) -> Result<impl Responder> {
    let tenant_id = helpers::tenant_id(req.headers())?;

    resolver
        .resolve_for_tenant(&tenant_id)
        .await
        .map(|entitlement| JsonResponse::build().set_item(entitlement).ok("OK"))
        .map_err(|err| {
            tracing::error!("Failed to resolve entitlement: {}", err);
            JsonResponse::<Entitlement>::build()
                .service_unavailable("entitlement is temporarily unavailable")
        })
}
