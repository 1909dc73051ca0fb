use crate::catalog::Catalog;
use crate::configuration::{GateSettings, Settings};
use crate::entitlement::{EntitlementPolicy, EntitlementResolver};
use crate::middleware::FeatureGate;
use crate::routes;
use crate::services::{SubscriptionStore, SubscriptionSync};
use actix_web::{dev::Server, web, App, HttpServer};
use std::io::{Error, ErrorKind};
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

const EVENTS_PATH: &str = "/api/v1/subscription/events";
const EVENTS_FEATURE: &str = "audit_log";
const WEBHOOK_BODY_LIMIT: usize = 256 * 1024;

/// Binds `app_host:app_port`. A taken or invalid address is an error for
/// the caller to report, not a panic.
pub fn listen(settings: &Settings) -> Result<TcpListener, std::io::Error> {
    let address = format!("{}:{}", settings.app_host, settings.app_port);
    tracing::info!("Start server at {:?}", &address);
    TcpListener::bind(&address).map_err(|err| {
        tracing::error!("Failed to bind to {}: {}", address, err);
        err
    })
}

pub async fn run(
    listener: TcpListener,
    store: Arc<dyn SubscriptionStore>,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    let catalog = Catalog::load(settings.catalog_path.as_deref()).map_err(|err| {
        tracing::error!("Catalog rejected: {}", err);
        Error::new(ErrorKind::InvalidData, err)
    })?;
    tracing::info!(catalog_version = catalog.version(), "Catalog loaded");

    let gates = gate_rules(&settings.gates, &catalog)?;
    let catalog = Arc::new(catalog);

    let resolver = web::Data::new(EntitlementResolver::new(
        catalog.clone(),
        store.clone(),
        EntitlementPolicy::from(&settings.entitlement),
    ));
    let sync = web::Data::new(SubscriptionSync::new(store.clone()));
    let store = web::Data::new(store);
    let catalog = web::Data::from(catalog);
    let settings = web::Data::new(settings);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(FeatureGate::new(gates.clone()))
            .wrap(TracingLogger::default())
            .app_data(web::PayloadConfig::new(WEBHOOK_BODY_LIMIT))
            .app_data(settings.clone())
            .app_data(catalog.clone())
            .app_data(store.clone())
            .app_data(resolver.clone())
            .app_data(sync.clone())
            .service(web::scope("/health_check").service(routes::health_check))
            .service(web::scope("/webhooks").service(routes::webhook::billing_handler))
            .service(
                web::scope("/api/v1")
                    .service(routes::catalog::plans_handler)
                    .service(routes::catalog::tiers_handler)
                    .service(routes::entitlement::entitlement_handler)
                    .service(routes::feature::access_handler)
                    .service(routes::subscription::events_handler),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Configured gates plus the history route's own gate. Every gated feature
/// must exist in the catalog.
fn gate_rules(configured: &[GateSettings], catalog: &Catalog) -> Result<Vec<GateSettings>, Error> {
    let mut gates = configured.to_vec();
    if crate::middleware::feature_gate::matching_rule(&gates, EVENTS_PATH).is_none() {
        gates.push(GateSettings {
            prefix: EVENTS_PATH.to_string(),
            feature: EVENTS_FEATURE.to_string(),
        });
    }

    for gate in &gates {
        if catalog.feature(&gate.feature).is_none() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("gate {} names unknown feature `{}`", gate.prefix, gate.feature),
            ));
        }
    }
    Ok(gates)
}
