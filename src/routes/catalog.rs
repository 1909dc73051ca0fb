use crate::catalog::Catalog;
use crate::helpers::JsonResponse;
use crate::models::{Feature, Plan, Tier};
use actix_web::{get, web, Responder, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TierView {
    pub tier: Tier,
    pub label: &'static str,
    pub rank: usize,
    pub features: Vec<Feature>,
}

#[tracing::instrument(name = "List plans.", skip(catalog))]
#[get("/plans")]
pub async fn plans_handler(catalog: web::Data<Catalog>) -> Result<impl Responder> {
    let plans: Vec<Plan> = catalog.plans().into_iter().cloned().collect();
    Ok(JsonResponse::build()
        .set_id(catalog.version())
        .set_list(plans)
        .ok("OK"))
}

#[tracing::instrument(name = "List tiers.", skip(catalog))]
#[get("/tiers")]
pub async fn tiers_handler(catalog: web::Data<Catalog>) -> Result<impl Responder> {
    let tiers: Vec<TierView> = Tier::ALL
        .iter()
        .map(|tier| TierView {
            tier: *tier,
            label: tier.label(),
            rank: tier.rank(),
            features: catalog.features_for_tier(*tier).to_vec(),
        })
        .collect();
    Ok(JsonResponse::build()
        .set_id(catalog.version())
        .set_list(tiers)
        .ok("OK"))
}
