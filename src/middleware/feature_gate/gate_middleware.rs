use crate::configuration::GateSettings;
use crate::entitlement::{require_feature, Entitlement, EntitlementResolver};
use crate::helpers::{self, JsonResponse};
use crate::middleware::feature_gate::matching_rule;
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse},
    web, Error, HttpMessage,
};
use futures::{
    future::{FutureExt, LocalBoxFuture},
    task::{Context, Poll},
};
use std::rc::Rc;

pub struct FeatureGateMiddleware<S> {
    pub service: Rc<S>,
    pub rules: Rc<Vec<GateSettings>>,
}

impl<S, B> Service<ServiceRequest> for FeatureGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        // the router matches on the percent-decoded path, so the gate must too
        let feature =
            matching_rule(&self.rules, req.match_info().as_str()).map(|rule| rule.feature.clone());

        async move {
            if let Some(feature) = feature {
                let entitlement = authorize(&req, &feature).await?;
                req.extensions_mut().insert(entitlement);
            }
            service.call(req).await
        }
        .boxed_local()
    }
}

#[tracing::instrument(name = "Feature gate.", skip(req), fields(path = %req.match_info().as_str()))]
async fn authorize(req: &ServiceRequest, feature: &str) -> Result<Entitlement, Error> {
    let tenant_id = helpers::tenant_id(req.headers())?;

    let resolver = req
        .app_data::<web::Data<EntitlementResolver>>()
        .ok_or_else(|| {
            tracing::error!("Entitlement resolver is not registered");
            JsonResponse::<()>::build().internal_server_error("")
        })?;

    let entitlement = resolver
        .resolve_for_tenant(&tenant_id)
        .await
        .map_err(|err| {
            tracing::error!("Failed to resolve entitlement: {}", err);
            JsonResponse::<()>::build().service_unavailable("entitlement is temporarily unavailable")
        })?;

    require_feature(&entitlement, feature, resolver.catalog())?;
    Ok(entitlement)
}
