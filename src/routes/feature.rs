use crate::entitlement::{require_feature, EntitlementResolver};
use crate::helpers::{self, JsonResponse};
use crate::models::{SubscriptionStatus, Tier};
use actix_web::{get, web, HttpRequest, Responder, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct FeatureAccess {
    pub allowed: bool,
    pub feature: String,
    pub tier: Option<Tier>,
    pub status: Option<SubscriptionStatus>,
}

/// 200 when the tenant holds the feature, 403 with the upgrade payload
/// otherwise.
#[tracing::instrument(name = "Check feature access.", skip(req, resolver))]
#[get("/features/{feature}/access")]
pub async fn access_handler(
    req: HttpRequest,
    path: web::Path<(String,)>,
    resolver: web::Data<EntitlementResolver>,
) -> Result<impl Responder> {
    let feature = path.into_inner().0;
    let tenant_id = helpers::tenant_id(req.headers())?;

    let entitlement = resolver
        .resolve_for_tenant(&tenant_id)
        .await
        .map_err(|err| {
            tracing::error!("Failed to resolve entitlement: {}", err);
            JsonResponse::<FeatureAccess>::build()
                .service_unavailable("entitlement is temporarily unavailable")
        })?;

    require_feature(&entitlement, &feature, resolver.catalog())?;

    let access = FeatureAccess {
        allowed: true,
        feature,
        tier: entitlement.tier,
        status: entitlement.status,
    };
    Ok(JsonResponse::build().set_item(access).ok("OK"))
}
