use crate::configuration::GateSettings;
use crate::middleware::feature_gate::FeatureGateMiddleware;
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use std::future::{ready, Ready};
use std::rc::Rc;

pub struct FeatureGate {
    rules: Rc<Vec<GateSettings>>,
}

impl FeatureGate {
    pub fn new(rules: Vec<GateSettings>) -> Self {
        Self {
            rules: Rc::new(rules),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for FeatureGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = FeatureGateMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(FeatureGateMiddleware {
            service: Rc::new(service),
            rules: self.rules.clone(),
        }))
    }
}
